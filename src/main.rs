mod cli;
mod helper;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    cli.command().handler(&config, &mut logger).await?;

    Ok(())
}
