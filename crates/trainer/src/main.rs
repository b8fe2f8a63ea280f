use anyhow::Result;
use clap::Parser;
use env_logger::Env;

use trainer::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    trainer::run_experiment(&config)?;
    Ok(())
}
