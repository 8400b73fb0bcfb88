use anyhow::Result;
use clap::Args;
use ippm_core::{IppmConfig, Project, Resolution, operations};
use std::env;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Module specifier, e.g. `left-pad` or `lodash/fp`
    pub specifier: String,
    /// File the import is made from (default: <project>/index.js)
    #[arg(long = "from")]
    pub from: Option<PathBuf>,
}

pub async fn run(args: ResolveArgs, config: &IppmConfig) -> Result<()> {
    let cwd = env::current_dir()?;
    let project = Project::discover(&cwd)?;

    let from = match args.from {
        Some(path) if path.is_absolute() => path,
        Some(path) => cwd.join(path),
        None => project.root.join("index.js"),
    };

    match operations::locate(config, &project, &args.specifier, &from)? {
        Resolution::Resolved(path) => println!("{}", path.display()),
        Resolution::PassThrough => println!("pass-through"),
    }

    Ok(())
}
