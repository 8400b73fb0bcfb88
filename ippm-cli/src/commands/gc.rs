use anyhow::Result;
use clap::Args;
use ippm_core::{Project, console, operations};
use std::env;

#[derive(Args, Debug)]
pub struct GcArgs {}

pub async fn run(_args: GcArgs) -> Result<()> {
    console::header("gc", env!("CARGO_PKG_VERSION"));

    let cwd = env::current_dir()?;
    let project = Project::discover(&cwd)?;
    let removed = operations::gc(&project)?;

    if removed.is_empty() {
        console::info("Nothing to collect.");
        return Ok(());
    }

    for identity in removed.iter() {
        console::info(&format!("- {}", identity));
    }
    console::info(&format!("Removed {} unreachable packages", removed.len()));

    Ok(())
}
