use crate::driver::CommandExecutor;
use crate::mount::ExternalMount;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

const MOUNT_CMD: &str = "mount";
const UNMOUNT_CMD: &str = "unmount";
const VOLUME_DRIVER_OPTION: &str = "--volumedriver=";
const VOLUME_NAME_OPTION: &str = "--volumename=";
const VOLUME_OPTS_OPTION: &str = "--volumeopts=";

/// `DvdCli` attaches and detaches external volumes through the `dvdcli` tool.
#[derive(Clone)]
pub struct DvdCli {
    /// Path of the `dvdcli` binary.
    program: PathBuf,
    executor: Arc<dyn CommandExecutor>,
}

impl DvdCli {
    pub fn new(program: PathBuf, executor: Arc<dyn CommandExecutor>) -> Self {
        DvdCli { program, executor }
    }

    fn mount_args(mount: &ExternalMount) -> Vec<String> {
        let mut args = vec![
            MOUNT_CMD.to_string(),
            format!("{}{}", VOLUME_DRIVER_OPTION, mount.driver),
            format!("{}{}", VOLUME_NAME_OPTION, mount.volume),
        ];
        args.extend(
            mount
                .option_tokens()
                .map(|token| format!("{}{}", VOLUME_OPTS_OPTION, token)),
        );
        args
    }

    fn unmount_args(mount: &ExternalMount) -> Vec<String> {
        vec![
            UNMOUNT_CMD.to_string(),
            format!("{}{}", VOLUME_DRIVER_OPTION, mount.driver),
            format!("{}{}", VOLUME_NAME_OPTION, mount.volume),
        ]
    }

    /// Attach a volume to the host.
    ///
    /// Fails if the tool could not be invoked or exited with a non-zero code.
    pub fn attach(&self, mount: &ExternalMount, caller: &str) -> Result<()> {
        log::info!("{} is being mounted on {}", mount, caller);

        let code = self
            .executor
            .execute(&self.program, &DvdCli::mount_args(mount))?;

        if code != 0 {
            log::error!(
                "{} {} failed on {} with exit code {}",
                self.program.display(),
                MOUNT_CMD,
                caller,
                code
            );
            return Err(Error::AttachFailed(format!(
                "{} exited with code {}",
                mount, code
            )));
        }

        Ok(())
    }

    /// Detach a volume from the host.
    ///
    /// A non-zero exit code is tolerated, the volume is assumed to have been unmounted
    /// manually. Only a failure to invoke the tool is an error.
    pub fn detach(&self, mount: &ExternalMount, caller: &str) -> Result<()> {
        log::info!("{} is being unmounted on {}", mount, caller);

        let code = self
            .executor
            .execute(&self.program, &DvdCli::unmount_args(mount))
            .map_err(|e| {
                log::error!("failed to dispatch unmount on {}: {}", caller, e);
                e
            })?;

        if code != 0 {
            log::warn!(
                "{} {} failed on {} with exit code {}, continuing on the assumption this volume was manually unmounted previously",
                self.program.display(),
                UNMOUNT_CMD,
                caller,
                code
            );
        }

        Ok(())
    }
}
