use crate::environment::Environment;
use crate::mount::contains_prohibited_chars;
use crate::Error;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The identifier the orchestrator gives to a container.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContainerId {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        if id.is_empty() || contains_prohibited_chars(id) {
            return Err(Error::InvalidContainerId(id.to_string()));
        }

        Ok(ContainerId(id.to_string()))
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the orchestrator hands over when a container is about to start.
#[derive(Debug)]
pub struct ContainerLaunch {
    pub id: ContainerId,
    /// The declared environment, `None` when the container has no environment at all.
    pub env: Option<Environment>,
    /// The sandbox directory of the container on the host.
    pub directory: PathBuf,
    pub rootfs: Option<PathBuf>,
    pub user: Option<String>,
}

/// A container the orchestrator still considers running after a restart.
///
/// Parsed from the `id:pid:directory` form.
#[derive(Clone, Debug, PartialEq)]
pub struct RunState {
    pub id: ContainerId,
    pub pid: i32,
    pub directory: PathBuf,
}

impl FromStr for RunState {
    type Err = Error;

    fn from_str(state: &str) -> Result<Self, Self::Err> {
        let mut parts = state.splitn(3, ':');

        let (id, pid, directory) = match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(pid), Some(directory)) => (id, pid, directory),
            _ => return Err(Error::InvalidRunState(state.to_string())),
        };

        let pid = pid
            .parse::<i32>()
            .map_err(|_| Error::InvalidRunState(state.to_string()))?;

        Ok(RunState {
            id: id.parse()?,
            pid,
            directory: PathBuf::from(directory),
        })
    }
}
