use anyhow::Result;
use clap::Parser;
use ippm_core::{IppmConfig, console};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    let args = Cli::parse();
    let mut config = IppmConfig::from_env();
    if args.verbose {
        config.verbose = true;
    }
    console::init_logging(config.verbose, config.log_file.as_deref());

    match args.command {
        Command::Init(args) => commands::init::run(args).await,
        Command::Install(args) => commands::install::run(args, &config).await,
        Command::List(args) => commands::list::run(args).await,
        Command::Gc(args) => commands::gc::run(args).await,
        Command::Resolve(args) => commands::resolve::run(args, &config).await,
        Command::Cat(args) => commands::cat::run(args, &config).await,
        Command::Mirror(args) => commands::mirror::run(args, &config).await,
        Command::Config(args) => commands::config::run(args, &config).await,
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
