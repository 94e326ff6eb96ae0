use clap::Parser;
use solorouter::cli::{run_cli, Cli};
use solorouter::logging::{init_logging, LogConfig};

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    run_cli(Cli::parse())
}
