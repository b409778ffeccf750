mod cleanup;
mod list;
mod prepare;
mod recover;

use crate::cli::cleanup::CleanupCommand;
use crate::cli::list::ListCommand;
use crate::cli::prepare::PrepareCommand;
use crate::cli::recover::RecoverCommand;
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use isolator::config::{DEFAULT_DVDCLI, DEFAULT_MOUNT_LIST, DEFAULT_VOLUME_DRIVER};
use isolator::IsolatorConfig;
use std::fmt;
use std::path::PathBuf;

/// CLI related errors
#[derive(Debug)]
pub enum Error {
    Isolator(isolator::Error),
}

impl From<isolator::Error> for Error {
    fn from(error: isolator::Error) -> Self {
        Self::Isolator(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Isolator(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {}

/// A common result type for our CLI.
pub type Result<T> = std::result::Result<T, Error>;

/// `Handler` is a trait that should be implemented for each of our commands.
///
/// It defines the contract & the input / output of a command execution.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Executes the command handler.
    ///
    /// Every command receives the isolator configuration built from the global options,
    /// and the logger to initialize.
    async fn handler(&self, config: &IsolatorConfig, logger: &mut env_logger::Builder)
        -> Result<()>;
}

#[derive(Parser, Debug)]
#[clap(version, author)]
pub struct Cli {
    /// The file holding the mount list
    #[clap(long, env = "DVDI_MOUNT_LIST", default_value = DEFAULT_MOUNT_LIST, global = true)]
    mount_list: PathBuf,
    /// The volume driver tool
    #[clap(long, env = "DVDI_CLI", default_value = DEFAULT_DVDCLI, global = true)]
    dvdcli: PathBuf,
    /// The volume driver used when a container does not name one
    #[clap(long, env = "DVDI_DEFAULT_DRIVER", default_value = DEFAULT_VOLUME_DRIVER, global = true)]
    default_driver: String,
    /// Do not refuse to run without root privileges
    #[clap(long, global = true)]
    allow_non_root: bool,
    #[clap(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    /// Build the isolator configuration from the global options.
    pub fn config(&self) -> IsolatorConfig {
        IsolatorConfig {
            mount_list: self.mount_list.clone(),
            dvdcli: self.dvdcli.clone(),
            default_driver: self.default_driver.clone(),
            require_root: !self.allow_non_root,
        }
    }

    /// Get the command used by the user.
    ///
    /// For example, if the user executes the command `cleanup`,
    /// we dynamically return the command so the `main` can
    /// execute it.
    pub fn command(self) -> Box<dyn Handler> {
        match self.command {
            Command::Prepare(cmd) => Box::new(cmd),
            Command::Cleanup(cmd) => Box::new(cmd),
            Command::Recover(cmd) => Box::new(cmd),
            Command::List(cmd) => Box::new(cmd),
        }
    }
}

/// Silence the logger if asked to, then initialize it.
pub(crate) fn init_logger(logger: &mut env_logger::Builder, quiet: bool) {
    if quiet {
        logger.filter_level(log::LevelFilter::Off);
    }
    logger.init();
}

/// The enumeration of our commands.
///
/// Each of our commands should be listed in this enumeration with the following format :
/// CommandName(CommandHandler)
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Attach the external volumes requested by a starting container
    Prepare(PrepareCommand),
    /// Detach the external volumes of a stopped container
    Cleanup(CleanupCommand),
    /// Reconcile the mount list with the running containers after a restart
    Recover(RecoverCommand),
    /// List the external mounts recorded for every container
    List(ListCommand),
}
