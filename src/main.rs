use clap::Parser;
use reactive_routing::cli::{run_cli, Cli};
use reactive_routing::logging::{init_logging, LogConfig};
use reactive_routing::runtime_config::RuntimeConfig;

fn main() -> anyhow::Result<()> {
    init_logging(&LogConfig::from_env())?;
    RuntimeConfig::from_env().apply();
    run_cli(Cli::parse())
}
