pub mod dvdcli;

use crate::{Error, Result};
use std::path::Path;
use std::process::Command;

/// The `CommandExecutor` trait is the boundary with the host command processor.
///
/// An implementation returns the exit code of the program when it could be invoked, and
/// `Error::CommandDispatch` when it could not be invoked at all.
pub trait CommandExecutor: Send + Sync {
    fn execute(&self, program: &Path, args: &[String]) -> Result<i32>;
}

/// `SystemExecutor` runs programs directly on the host, without a shell.
#[derive(Debug, Default)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, program: &Path, args: &[String]) -> Result<i32> {
        let status = Command::new(program).args(args).status().map_err(|e| {
            Error::CommandDispatch(format!("failed to run {}: {}", program.display(), e))
        })?;

        // Killed by a signal
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::CommandExecutor;
    use crate::{Error, Result};
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Records every invocation, and fails the ones it was told to.
    #[derive(Default)]
    pub struct FakeExecutor {
        calls: Mutex<Vec<Vec<String>>>,
        /// Volumes whose `mount` exits with a non-zero code.
        failing_mounts: Mutex<HashSet<String>>,
        /// Volumes whose `unmount` exits with a non-zero code.
        failing_unmounts: Mutex<HashSet<String>>,
        unavailable: AtomicBool,
    }

    impl FakeExecutor {
        pub fn fail_mount(&self, volume: &str) {
            self.failing_mounts.lock().unwrap().insert(volume.to_string());
        }

        pub fn fail_unmount(&self, volume: &str) {
            self.failing_unmounts
                .lock()
                .unwrap()
                .insert(volume.to_string());
        }

        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        /// The volumes passed to the given subcommand, in call order.
        pub fn volumes(&self, subcommand: &str) -> Vec<String> {
            self.calls()
                .iter()
                .filter(|args| args[0] == subcommand)
                .filter_map(|args| {
                    args.iter()
                        .find_map(|arg| arg.strip_prefix("--volumename=").map(str::to_string))
                })
                .collect()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    impl CommandExecutor for FakeExecutor {
        fn execute(&self, program: &Path, args: &[String]) -> Result<i32> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(Error::CommandDispatch(format!(
                    "no command processor for {}",
                    program.display()
                )));
            }

            self.calls.lock().unwrap().push(args.to_vec());

            let failing = match args[0].as_str() {
                "mount" => &self.failing_mounts,
                _ => &self.failing_unmounts,
            };
            let failing = failing.lock().unwrap();
            let fails = args.iter().any(|arg| {
                arg.strip_prefix("--volumename=")
                    .map_or(false, |volume| failing.contains(volume))
            });

            Ok(if fails { 1 } else { 0 })
        }
    }
}
