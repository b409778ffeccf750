use std::collections::HashSet;
use std::fmt;
use std::fs::create_dir_all;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task;

use driver::dvdcli::DvdCli;
use ledger::Ledger;
use lock::MountListLock;
use mount::MountIdentity;

pub use config::IsolatorConfig;
pub use container::{ContainerId, ContainerLaunch, RunState};
pub use driver::{CommandExecutor, SystemExecutor};
pub use environment::Environment;
pub use mount::ExternalMount;
pub use state::{MountList, MountRecord};

pub mod config;
mod container;
pub mod driver;
mod environment;
mod ledger;
mod lock;
pub mod mount;
mod recover;
pub mod request;
mod state;

/// Labels of the operations, used when logging driver invocations.
const PREPARE: &str = "prepare";
const PREPARE_ROLLBACK: &str = "prepare-rollback";
const CLEANUP: &str = "cleanup";
const RECOVER: &str = "recover";

/// Isolator related errors
#[derive(Debug)]
pub enum Error {
    /// An environment variable holds a value with prohibited characters.
    ProhibitedCharacters(String),
    /// The container identifier is empty or holds prohibited characters.
    InvalidContainerId(String),
    /// A running container description is not in the `id:pid:directory` form.
    InvalidRunState(String),
    /// The volume driver tool could not be invoked at all.
    CommandDispatch(String),
    /// The volume driver tool failed to attach a volume.
    AttachFailed(String),
    /// Fail to create the directory holding the mount list.
    CreateStateDirectory(std::io::Error),
    /// Fail to serialize the mount list.
    SerializeLedger(serde_json::Error),
    /// Fail to write the mount list file.
    PersistLedger(std::io::Error),
    /// Fail to open the lock file of the mount list.
    OpenLock(std::io::Error),
    /// Fail to take the lock of the mount list.
    LockMountList(nix::Error),
    /// The isolator must run as root.
    NotPrivileged,
    /// A blocking driver invocation panicked or was cancelled.
    TaskJoin(String),
    /// Fail to load the OCI runtime configuration of a bundle.
    LoadBundle(oci_spec::OciSpecError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ProhibitedCharacters(name) => write!(
                f,
                "environment variable {} contains prohibited characters",
                name
            ),
            Error::InvalidContainerId(id) => write!(f, "invalid container id '{}'", id),
            Error::InvalidRunState(state) => write!(
                f,
                "invalid running container '{}', expected id:pid:directory",
                state
            ),
            Error::CommandDispatch(reason) => {
                write!(f, "failed to invoke the volume driver tool: {}", reason)
            }
            Error::AttachFailed(reason) => write!(f, "failed to mount volume: {}", reason),
            Error::CreateStateDirectory(e) => {
                write!(f, "failed to create the mount list directory: {}", e)
            }
            Error::SerializeLedger(e) => write!(f, "failed to serialize the mount list: {}", e),
            Error::PersistLedger(e) => write!(f, "failed to write the mount list: {}", e),
            Error::OpenLock(e) => write!(f, "failed to open the mount list lock: {}", e),
            Error::LockMountList(e) => write!(f, "failed to lock the mount list: {}", e),
            Error::NotPrivileged => write!(f, "the volume isolator requires root privileges"),
            Error::TaskJoin(reason) => write!(f, "volume driver task failed: {}", reason),
            Error::LoadBundle(e) => write!(f, "failed to load the bundle configuration: {}", e),
        }
    }
}

impl std::error::Error for Error {}

/// A common result type for our crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Summary of a successful recovery.
#[derive(Debug, Default)]
pub struct Recovery {
    /// Number of usable records found in the mount list.
    pub recovered: usize,
    /// Running containers whose mounts were kept.
    pub adopted: Vec<ContainerId>,
    /// Identities unmounted because no running container uses them.
    pub detached: Vec<MountIdentity>,
}

/// The `VolumeIsolator` manages the external volumes shared by the containers of a host.
///
/// A volume is attached once, whatever the number of containers using it, and detached when
/// the last of them is cleaned up. The ledger is saved into the mount list file after every
/// change so that it can be reconciled with the running containers after a restart.
///
/// Every operation holds the ledger lock from start to end, driver invocations included.
/// It also holds the lock of the mount list file, and reads the ledger back from the file
/// once that lock is taken, so that isolators of other processes sharing the same mount
/// list never work on a stale ledger.
pub struct VolumeIsolator {
    config: IsolatorConfig,
    cli: DvdCli,
    ledger: Arc<Mutex<Ledger>>,
}

impl VolumeIsolator {
    /// Create an isolator with an empty ledger.
    ///
    /// `recover` is expected to be called before any other operation, until then the ledger
    /// is whatever the mount list file holds.
    pub fn new(config: IsolatorConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        VolumeIsolator::with_config(config, executor)
    }

    /// Create an isolator whose ledger is the mount list as it is on disk.
    ///
    /// No reconciliation happens, the file is trusted to reflect running containers.
    pub fn open(config: IsolatorConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        let mut isolator = VolumeIsolator::with_config(config, executor)?;

        let ledger = {
            let _lock = MountListLock::acquire(&isolator.config.mount_list)?;
            isolator.load()
        };

        if !ledger.is_empty() {
            log::debug!(
                "adopted {} mount entries for {} containers from {}",
                ledger.len(),
                ledger.containers().count(),
                isolator.config.mount_list.display()
            );
        }

        isolator.ledger = Arc::new(Mutex::new(ledger));
        Ok(isolator)
    }

    fn with_config(config: IsolatorConfig, executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        if config.require_root && !nix::unistd::Uid::effective().is_root() {
            return Err(Error::NotPrivileged);
        }

        if let Some(parent) = config.mount_list.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                log::debug!("creating mount list directory {}", parent.display());
                create_dir_all(parent).map_err(Error::CreateStateDirectory)?;
            }
        }

        Ok(VolumeIsolator {
            cli: DvdCli::new(config.dvdcli.clone(), executor),
            config,
            ledger: Arc::new(Mutex::new(Ledger::default())),
        })
    }

    /// Attach the external volumes requested by a starting container.
    ///
    /// Either every requested volume ends up attached and recorded for the container, or
    /// none is newly attached and the ledger is left untouched.
    pub async fn prepare(&self, launch: &ContainerLaunch) -> Result<()> {
        log::info!("preparing external storage for container {}", launch.id);
        log::debug!(
            "container {} directory={} rootfs={:?} user={:?}",
            launch.id,
            launch.directory.display(),
            launch.rootfs,
            launch.user
        );

        let env = match &launch.env {
            Some(env) => env,
            None => {
                log::info!("no environment specified for container {}", launch.id);
                return Ok(());
            }
        };

        let requested = request::parse_requests(env, &self.config.default_driver)?;
        if requested.is_empty() {
            return Ok(());
        }

        let mut ledger = self.ledger.lock().await;
        let _lock = self.lock().await?;
        *ledger = self.load();

        let mut identities = Vec::<MountIdentity>::new();
        let mut unconnected = Vec::<ExternalMount>::new();
        for mount in &requested {
            let identity = mount.identity();
            if identities.contains(&identity) {
                log::info!(
                    "duplicate mount request ({}) in environment will be ignored",
                    mount
                );
                continue;
            }

            if ledger.is_attached(&identity) {
                log::info!(
                    "requested mount ({}) is already mounted by another container",
                    mount
                );
            } else {
                unconnected.push(mount.clone());
            }
            identities.push(identity);
        }

        let mut attached = Vec::<ExternalMount>::new();
        for mount in unconnected {
            if let Err(e) = self.attach(mount.clone(), PREPARE).await {
                log::error!("mount of {} failed for container {}: {}", mount, launch.id, e);
                self.rollback(&attached).await;
                return Err(e);
            }
            attached.push(mount);
        }

        // One entry per request, even for a mount already attached or requested twice
        let previous = ledger.clone();
        for mount in requested {
            let options = mount.options.clone();
            let effective = ledger.insert(&launch.id, mount);
            if effective.options != options {
                log::warn!(
                    "mount {} keeps the options it was attached with, '{}' ignored for container {}",
                    effective,
                    options,
                    launch.id
                );
            }
        }

        if let Err(e) = self.persist(&ledger) {
            *ledger = previous;
            self.rollback(&attached).await;
            return Err(e);
        }

        Ok(())
    }

    /// Detach the mounts made during a failed `prepare`.
    ///
    /// Failures are only logged, the caller is already failing.
    async fn rollback(&self, attached: &[ExternalMount]) {
        for mount in attached {
            if let Err(e) = self.detach(mount.clone(), PREPARE_ROLLBACK).await {
                log::error!(
                    "failed to remove mount {} while reverting a failed prepare: {}",
                    mount,
                    e
                );
            }
        }
    }

    /// Detach the volumes of a stopping container that no other container uses.
    ///
    /// On failure the ledger is left untouched so that the call can be repeated.
    pub async fn cleanup(&self, container: &ContainerId) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        let _lock = self.lock().await?;
        *ledger = self.load();

        if !ledger.contains(container) {
            log::debug!("no external mounts recorded for container {}", container);
            return Ok(());
        }

        let mut remaining = ledger.clone();
        let released = remaining.remove_container(container);

        for identity in ledger.identities_of(container) {
            if !released.contains(&identity) {
                log::info!(
                    "mount {} is still used by {} other container(s)",
                    identity,
                    remaining.holders(&identity)
                );
                continue;
            }

            if let Some(mount) = ledger.attached(&identity) {
                let mount = ExternalMount::clone(mount);
                self.detach(mount, CLEANUP).await?;
            }
        }

        self.persist(&remaining)?;
        *ledger = remaining;

        Ok(())
    }

    /// Rebuild the ledger after a restart.
    ///
    /// The mount list is reconciled with the containers the orchestrator reports as running,
    /// and the volumes only used by containers gone in between are detached.
    pub async fn recover(
        &self,
        running: &[RunState],
        orphans: &HashSet<ContainerId>,
    ) -> Result<Recovery> {
        let mut ledger = self.ledger.lock().await;
        let _lock = self.lock().await?;

        for orphan in orphans {
            log::info!("container {} reported as orphan", orphan);
        }

        let list = MountList::load(&self.config.mount_list);
        let reconciliation = recover::reconcile(&list, running, &self.config.default_driver);

        *ledger = reconciliation.ledger;
        self.persist(&ledger)?;

        let mut detached = Vec::<MountIdentity>::new();
        for mount in reconciliation.orphans {
            let identity = mount.identity();
            self.detach(mount, RECOVER).await?;
            detached.push(identity);
        }

        log::info!(
            "recovered {} containers, {} orphaned mounts removed",
            reconciliation.adopted.len(),
            detached.len()
        );

        Ok(Recovery {
            recovered: reconciliation.recovered,
            adopted: reconciliation.adopted,
            detached,
        })
    }

    /// Get a snapshot of the ledger, in the persisted form.
    pub async fn records(&self) -> Vec<MountRecord> {
        MountList::from(&*self.ledger.lock().await).mounts
    }

    /// Take the lock of the mount list, waiting for other isolators to release it.
    async fn lock(&self) -> Result<MountListLock> {
        let path = self.config.mount_list.clone();
        task::spawn_blocking(move || MountListLock::acquire(&path))
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?
    }

    /// Read the ledger back from the mount list, its lock must be held.
    fn load(&self) -> Ledger {
        let list = MountList::load(&self.config.mount_list);
        recover::adopt(&list, &self.config.default_driver)
    }

    fn persist(&self, ledger: &Ledger) -> Result<()> {
        MountList::from(ledger).save(&self.config.mount_list)
    }

    async fn attach(&self, mount: ExternalMount, caller: &'static str) -> Result<()> {
        let cli = self.cli.clone();
        task::spawn_blocking(move || cli.attach(&mount, caller))
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?
    }

    async fn detach(&self, mount: ExternalMount, caller: &'static str) -> Result<()> {
        let cli = self.cli.clone();
        task::spawn_blocking(move || cli.detach(&mount, caller))
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?
    }
}
