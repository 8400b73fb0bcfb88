use anyhow::Result;
use clap::Args;
use ippm_core::{IppmConfig, Project, operations};
use std::env;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct CatArgs {
    /// Package identity (`name@version`) or root dependency name
    pub package: String,
    /// File inside the package (default: its main entry)
    pub path: Option<String>,
}

pub async fn run(args: CatArgs, config: &IppmConfig) -> Result<()> {
    let cwd = env::current_dir()?;
    let project = Project::discover(&cwd)?;

    let contents = operations::cat(config, &project, &args.package, args.path.as_deref()).await?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&contents)?;
    stdout.flush()?;

    Ok(())
}
