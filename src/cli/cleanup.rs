use crate::cli::{init_logger, Handler, Result};
use crate::helper::get_isolator_instance;
use async_trait::async_trait;
use clap::Args;
use isolator::{ContainerId, IsolatorConfig};

/// Arguments for our `CleanupCommand`.
///
/// Example :
///
/// `dvdi cleanup c1`
#[derive(Debug, Args)]
pub struct CleanupCommand {
    /// The container identifier.
    container_id: String,
    /// If set, the command will be executed silently.
    #[clap(long, short)]
    quiet: bool,
}

#[async_trait]
impl Handler for CleanupCommand {
    async fn handler(
        &self,
        config: &IsolatorConfig,
        logger: &mut env_logger::Builder,
    ) -> Result<()> {
        init_logger(logger, self.quiet);

        let container_id = self.container_id.parse::<ContainerId>()?;

        let isolator = get_isolator_instance(config)?;
        isolator.cleanup(&container_id).await?;

        Ok(())
    }
}
