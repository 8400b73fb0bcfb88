use crate::commands;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "ippm",
    about = "content-addressed package manager",
    version,
    color = clap::ColorChoice::Auto
)]
pub struct Cli {
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new ippm.json
    Init(commands::init::InitArgs),
    /// Add packages to the project lock
    Install(commands::install::InstallArgs),
    /// List the packages recorded in the lock
    List(commands::list::ListArgs),
    /// Remove lock records no longer reachable from the project
    Gc(commands::gc::GcArgs),
    /// Resolve a module specifier the way the runtime hook would
    Resolve(commands::resolve::ResolveArgs),
    /// Print a file of an installed package from the content store
    Cat(commands::cat::CatArgs),
    /// Mirror the upstream registry into the content store
    Mirror(commands::mirror::MirrorArgs),
    /// Show the resolved configuration
    Config(commands::config::ConfigArgs),
}
