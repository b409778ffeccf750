use crate::container::{ContainerId, RunState};
use crate::ledger::Ledger;
use crate::mount::{contains_prohibited_chars, ExternalMount, MountIdentity};
use crate::state::MountList;
use std::collections::{BTreeMap, HashMap};

/// The outcome of reconciling a mount list with the containers still running.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// The ledger rebuilt for the running containers only.
    pub ledger: Ledger,
    /// Number of usable records found in the mount list.
    pub recovered: usize,
    /// Running containers whose mounts were found in the mount list.
    pub adopted: Vec<ContainerId>,
    /// Mounts no running container depends on anymore, one per identity.
    pub orphans: Vec<ExternalMount>,
}

/// Turn the persisted records into mounts, keyed by the container id as it was written.
///
/// A driver or volume name holding prohibited characters is cleared, and records without
/// a container id or a volume name are dropped.
fn previous_mounts(list: &MountList, default_driver: &str) -> Vec<(String, ExternalMount)> {
    let mut mounts = Vec::<(String, ExternalMount)>::new();

    for record in &list.mounts {
        let mut driver = record.driver.as_str();
        if contains_prohibited_chars(driver) {
            log::error!(
                "volume driver of container {} contains an illegal character, it will be ignored",
                record.container_id
            );
            driver = "";
        }

        let mut volume = record.volume.as_str();
        if contains_prohibited_chars(volume) {
            log::error!(
                "volume name of container {} contains an illegal character, mount will be ignored",
                record.container_id
            );
            volume = "";
        }

        if record.container_id.is_empty() || volume.is_empty() {
            continue;
        }

        mounts.push((
            record.container_id.clone(),
            ExternalMount::new(driver, volume, &record.options, default_driver),
        ));
    }

    mounts
}

/// Rebuild the ledger from a mount list and the containers reported as running.
///
/// Every identity present in the list that no running container depends on is an orphan.
pub fn reconcile(list: &MountList, running: &[RunState], default_driver: &str) -> Reconciliation {
    // Keyed by string, some containers of the list may not be valid ids anymore
    let mut previous = HashMap::<String, Vec<ExternalMount>>::new();
    let mut legacy = BTreeMap::<MountIdentity, ExternalMount>::new();
    let mut recovered = 0;

    for (container_id, mount) in previous_mounts(list, default_driver) {
        recovered += 1;
        legacy
            .entry(mount.identity())
            .or_insert_with(|| mount.clone());
        previous.entry(container_id).or_default().push(mount);
    }

    log::info!(
        "found evidence of {} previous external mounts over {} identities",
        recovered,
        legacy.len()
    );

    let mut ledger = Ledger::default();
    let mut adopted = Vec::<ContainerId>::new();

    for state in running {
        if ledger.contains(&state.id) {
            continue;
        }

        if let Some(mounts) = previous.get(state.id.as_str()) {
            log::info!(
                "running container {} (pid {}, directory {}) re-identified on recover",
                state.id,
                state.pid,
                state.directory.display()
            );
            for mount in mounts {
                log::info!("re-identified a preserved mount {}", mount.identity());
                ledger.insert(&state.id, mount.clone());
            }
            adopted.push(state.id.clone());
        }
    }

    let orphans = legacy
        .into_values()
        .filter(|mount| !ledger.is_attached(&mount.identity()))
        .collect::<Vec<ExternalMount>>();

    Reconciliation {
        ledger,
        recovered,
        adopted,
        orphans,
    }
}

/// Take a mount list as the current ledger, without looking at running containers.
pub fn adopt(list: &MountList, default_driver: &str) -> Ledger {
    let mut ledger = Ledger::default();

    for (container_id, mount) in previous_mounts(list, default_driver) {
        match container_id.parse::<ContainerId>() {
            Ok(id) => {
                ledger.insert(&id, mount);
            }
            Err(e) => log::warn!("dropping mount {} of unknown container: {}", mount, e),
        }
    }

    ledger
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MountRecord;
    use std::path::PathBuf;

    const DEFAULT_DRIVER: &str = "rexray";

    fn record(container_id: &str, driver: &str, volume: &str) -> MountRecord {
        MountRecord {
            container_id: container_id.to_string(),
            driver: driver.to_string(),
            volume: volume.to_string(),
            options: String::new(),
        }
    }

    fn running(id: &str) -> RunState {
        RunState {
            id: id.parse().unwrap(),
            pid: 1,
            directory: PathBuf::from("/tmp"),
        }
    }

    fn volumes(mounts: &[ExternalMount]) -> Vec<&str> {
        mounts.iter().map(|m| m.volume.as_str()).collect()
    }

    #[test]
    fn test_dead_containers_are_dropped() {
        let list = MountList {
            mounts: vec![record("a", "d1", "va"), record("b", "d1", "vb")],
        };

        let reconciliation = reconcile(&list, &[running("a")], DEFAULT_DRIVER);

        assert_eq!(reconciliation.recovered, 2);
        assert_eq!(reconciliation.adopted, vec!["a".parse::<ContainerId>().unwrap()]);
        assert_eq!(reconciliation.ledger.len(), 1);
        assert_eq!(volumes(&reconciliation.orphans), vec!["vb"]);
    }

    #[test]
    fn test_mount_shared_with_running_container_is_not_orphaned() {
        let list = MountList {
            mounts: vec![record("a", "d1", "v1"), record("b", "d1", "v1")],
        };

        let reconciliation = reconcile(&list, &[running("a")], DEFAULT_DRIVER);

        assert!(reconciliation.orphans.is_empty());
        assert_eq!(reconciliation.ledger.len(), 1);
    }

    #[test]
    fn test_orphans_are_distinct_identities() {
        let list = MountList {
            mounts: vec![
                record("a", "d1", "v1"),
                record("b", "d1", "v1"),
                record("b", "d2", "v1"),
            ],
        };

        let reconciliation = reconcile(&list, &[], DEFAULT_DRIVER);

        assert!(reconciliation.ledger.is_empty());
        assert_eq!(reconciliation.orphans.len(), 2);
    }

    #[test]
    fn test_all_running_reproduces_ledger() {
        let list = MountList {
            mounts: vec![
                record("a", "d1", "v1"),
                record("a", "d1", "v2"),
                record("b", "d1", "v1"),
            ],
        };

        let reconciliation = reconcile(&list, &[running("b"), running("a")], DEFAULT_DRIVER);

        assert!(reconciliation.orphans.is_empty());
        assert_eq!(MountList::from(&reconciliation.ledger), list);
    }

    #[test]
    fn test_prohibited_fields_are_sanitized() {
        let list = MountList {
            mounts: vec![
                record("a", "d1", "v1;reboot"),
                record("a", "bad|driver", "v2"),
                record("", "d1", "v3"),
            ],
        };

        let reconciliation = reconcile(&list, &[running("a")], DEFAULT_DRIVER);

        assert_eq!(reconciliation.recovered, 1);
        let entries = reconciliation
            .ledger
            .iter()
            .map(|(_, m)| (m.driver.clone(), m.volume.clone()))
            .collect::<Vec<(String, String)>>();
        assert_eq!(entries, vec![(DEFAULT_DRIVER.to_string(), "v2".to_string())]);
    }

    #[test]
    fn test_unparsable_container_ids_still_produce_orphans() {
        let list = MountList {
            mounts: vec![record("old container", "d1", "v1")],
        };

        let reconciliation = reconcile(&list, &[], DEFAULT_DRIVER);
        assert_eq!(volumes(&reconciliation.orphans), vec!["v1"]);

        assert!(adopt(&list, DEFAULT_DRIVER).is_empty());
    }

    #[test]
    fn test_adopt_takes_every_record() {
        let list = MountList {
            mounts: vec![record("a", "d1", "v1"), record("b", "", "v1")],
        };

        let ledger = adopt(&list, DEFAULT_DRIVER);

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.containers().count(), 2);
    }
}
