use anyhow::{Context, Result};
use clap::Parser;
use debtbook::cli::Cli;
use debtbook::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;

    let log_level = cli.log_level_override().unwrap_or(config.log_level.as_str());
    debtbook::init_tracing(log_level);

    cli.run(config).await
}
