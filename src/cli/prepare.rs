use crate::cli::{init_logger, Handler, Result};
use crate::helper::get_isolator_instance;
use async_trait::async_trait;
use clap::Args;
use isolator::{ContainerId, ContainerLaunch, Environment, IsolatorConfig};
use std::path::PathBuf;

/// Arguments for our `PrepareCommand`.
///
/// The container environment is read from the bundle, if any, then completed
/// with the `--env` variables.
///
/// Example :
///
/// `dvdi prepare c1 -e DVDI_VOLUME_NAME=data -e DVDI_VOLUME_DRIVER=rexray`
#[derive(Debug, Args)]
pub struct PrepareCommand {
    /// The container identifier.
    container_id: String,
    /// A container environment variable, as KEY=VALUE.
    #[clap(short = 'e', long = "env")]
    environment: Vec<String>,
    /// An OCI bundle declaring the container process environment.
    #[clap(short, long)]
    bundle: Option<PathBuf>,
    /// The container sandbox directory.
    #[clap(long, default_value = ".")]
    directory: PathBuf,
    /// The container root filesystem.
    #[clap(long)]
    rootfs: Option<PathBuf>,
    /// The user the container runs as.
    #[clap(long)]
    user: Option<String>,
    /// If set, the command will be executed silently.
    #[clap(long, short)]
    quiet: bool,
}

impl PrepareCommand {
    fn environment(&self) -> Result<Option<Environment>> {
        let env = match &self.bundle {
            Some(bundle) => Environment::load_bundle(bundle)?,
            None => None,
        };

        if self.environment.is_empty() {
            return Ok(env);
        }

        let flags = Environment::parse(&self.environment);
        Ok(Some(match env {
            Some(mut env) => {
                env.extend(flags);
                env
            }
            None => flags,
        }))
    }
}

#[async_trait]
impl Handler for PrepareCommand {
    async fn handler(
        &self,
        config: &IsolatorConfig,
        logger: &mut env_logger::Builder,
    ) -> Result<()> {
        init_logger(logger, self.quiet);

        let launch = ContainerLaunch {
            id: self.container_id.parse::<ContainerId>()?,
            env: self.environment()?,
            directory: self.directory.clone(),
            rootfs: self.rootfs.clone(),
            user: self.user.clone(),
        };

        let isolator = get_isolator_instance(config)?;
        isolator.prepare(&launch).await?;

        Ok(())
    }
}
