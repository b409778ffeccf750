use crate::state::sibling_path;
use crate::{Error, Result};
use nix::errno::Errno;
use nix::fcntl::{flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// `MountListLock` is an exclusive advisory lock (`flock(LOCK_EX)`) over a mount list.
///
/// Every isolator working on the same mount list, in this process or another one, takes it
/// before reading the file and keeps it until the file has been written back. It is released
/// when the guard is dropped.
#[derive(Debug)]
pub struct MountListLock {
    file: File,
    path: PathBuf,
}

impl MountListLock {
    /// Block until the lock of the mount list at `mount_list` is held.
    ///
    /// The lock file is `<mount_list>.lock`, created on first use and never removed.
    pub fn acquire(mount_list: &Path) -> Result<Self> {
        let path = sibling_path(mount_list, "lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(Error::OpenLock)?;

        loop {
            match flock(file.as_raw_fd(), FlockArg::LockExclusive) {
                Ok(()) => break,
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(Error::LockMountList(e)),
            }
        }

        log::debug!("acquired mount list lock {}", path.display());
        Ok(MountListLock { file, path })
    }
}

impl Drop for MountListLock {
    fn drop(&mut self) {
        // Closing the file would release it as well
        if let Err(e) = flock(self.file.as_raw_fd(), FlockArg::Unlock) {
            log::warn!(
                "failed to release mount list lock {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempdir::TempDir;

    #[test]
    fn test_lock_file_sits_next_to_mount_list() -> Result<()> {
        let dir = TempDir::new("dvdi_lock").map_err(Error::OpenLock)?;
        let mount_list = dir.path().join("mounts.json");

        let _lock = MountListLock::acquire(&mount_list)?;

        assert!(dir.path().join("mounts.json.lock").exists());
        assert!(!mount_list.exists());
        Ok(())
    }

    #[test]
    fn test_lock_is_exclusive_until_dropped() -> Result<()> {
        let dir = TempDir::new("dvdi_lock").map_err(Error::OpenLock)?;
        let mount_list = dir.path().join("mounts.json");

        let lock = MountListLock::acquire(&mount_list)?;

        let (tx, rx) = mpsc::channel();
        let contender = mount_list.clone();
        let handle = thread::spawn(move || {
            let lock = MountListLock::acquire(&contender);
            tx.send(lock.is_ok()).unwrap();
        });

        // The second open file description must wait for the first one
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        drop(lock);
        assert!(rx.recv_timeout(Duration::from_secs(10)).unwrap());
        handle.join().unwrap();

        Ok(())
    }
}
