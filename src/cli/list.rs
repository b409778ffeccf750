use crate::cli::{init_logger, Handler, Result};
use crate::helper::get_isolator_instance;
use async_trait::async_trait;
use clap::Args;
use isolator::IsolatorConfig;

/// Arguments for our `ListCommand`.
///
/// Prints one line per recorded mount: container, driver, volume and options.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// If set, the command will be executed silently.
    #[clap(long, short)]
    quiet: bool,
}

#[async_trait]
impl Handler for ListCommand {
    async fn handler(
        &self,
        config: &IsolatorConfig,
        logger: &mut env_logger::Builder,
    ) -> Result<()> {
        init_logger(logger, self.quiet);

        let isolator = get_isolator_instance(config)?;
        for record in isolator.records().await {
            println!(
                "{}\t{}\t{}\t{}",
                record.container_id, record.driver, record.volume, record.options
            );
        }

        Ok(())
    }
}
