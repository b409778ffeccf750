use crate::cli::{init_logger, Handler, Result};
use crate::helper::get_recovering_isolator_instance;
use async_trait::async_trait;
use clap::Args;
use isolator::{ContainerId, IsolatorConfig, RunState};
use std::collections::HashSet;

/// Arguments for our `RecoverCommand`.
///
/// Example :
///
/// `dvdi recover --running c1:4242:/var/lib/agent/runs/c1 --orphan c2`
#[derive(Debug, Args)]
pub struct RecoverCommand {
    /// A container still running, as id:pid:directory.
    #[clap(long = "running")]
    running: Vec<String>,
    /// A container the orchestrator considers orphaned.
    #[clap(long = "orphan")]
    orphans: Vec<String>,
    /// If set, the command will be executed silently.
    #[clap(long, short)]
    quiet: bool,
}

#[async_trait]
impl Handler for RecoverCommand {
    async fn handler(
        &self,
        config: &IsolatorConfig,
        logger: &mut env_logger::Builder,
    ) -> Result<()> {
        init_logger(logger, self.quiet);

        let running = self
            .running
            .iter()
            .map(|state| state.parse::<RunState>())
            .collect::<isolator::Result<Vec<RunState>>>()?;
        let orphans = self
            .orphans
            .iter()
            .map(|id| id.parse::<ContainerId>())
            .collect::<isolator::Result<HashSet<ContainerId>>>()?;

        let isolator = get_recovering_isolator_instance(config)?;
        let recovery = isolator.recover(&running, &orphans).await?;

        println!(
            "{} mount records found, {} containers recovered, {} orphaned mounts removed",
            recovery.recovered,
            recovery.adopted.len(),
            recovery.detached.len()
        );
        Ok(())
    }
}
