use anyhow::Result;
use clap::Args;
use ippm_core::{IppmConfig, Project, console, operations};
use std::env;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Record the packages in ippm.json
    #[arg(short = 's', long = "save")]
    pub save: bool,
    /// Packages to add (`name`, `name@version`, `name@range`, `name@tag`)
    pub packages: Vec<String>,
}

pub async fn run(args: InstallArgs, config: &IppmConfig) -> Result<()> {
    console::header("install", env!("CARGO_PKG_VERSION"));

    let cwd = env::current_dir()?;
    let mut project = Project::discover(&cwd)?;

    let options = operations::InstallOptions {
        requested: args.packages,
        save: args.save,
    };
    let result = operations::install(config, &mut project, options).await?;

    console::summary(result.package_count, result.elapsed_seconds);

    Ok(())
}
