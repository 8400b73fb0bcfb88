use anyhow::Result;
use clap::Args;
use ippm_core::{Project, console, operations};
use std::env;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show the project's direct dependencies
    #[arg(long = "root")]
    pub root_only: bool,
}

pub async fn run(args: ListArgs) -> Result<()> {
    console::header("list", env!("CARGO_PKG_VERSION"));

    let cwd = env::current_dir()?;
    let project = Project::discover(&cwd)?;
    let packages = operations::list(&project)?;

    for package in packages.iter() {
        if args.root_only && !package.is_root() {
            continue;
        }
        console::package(
            &package.identity,
            package.address.as_deref(),
            &package.dependencies,
        );
    }

    Ok(())
}
