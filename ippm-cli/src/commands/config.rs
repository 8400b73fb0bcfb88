use anyhow::Result;
use clap::Args;
use ippm_core::{IppmConfig, console};

#[derive(Args, Debug)]
pub struct ConfigArgs {}

pub async fn run(_args: ConfigArgs, config: &IppmConfig) -> Result<()> {
    console::header("config", env!("CARGO_PKG_VERSION"));

    console::info("paths");
    console::info(&format!("  home dir: {}", config.home_dir.display()));
    console::info(&format!("  cache dir: {}", config.cache_dir().display()));
    console::info(&format!("  store root: {}", config.store_root.display()));
    console::info(&format!("  mirror dir: {}", config.mirror_dir.display()));
    println!();

    console::info("endpoints");
    console::info(&format!("  registry: {}", config.registry));
    console::info(&format!("  change feed: {}", config.feed_url));
    console::info(&format!("  store api: {}", config.store_api));
    println!();

    console::info("mirror");
    console::info(&format!("  batch size: {}", config.batch_size));
    console::info(&format!("  max retries: {}", config.max_retries));
    console::info(&format!("  feed retries: {}", config.feed_retries));
    console::info(&format!("  fetch attempts: {}", config.fetch_attempts));
    console::info(&format!("  retry delay: {}ms", config.retry_delay_ms));
    println!();

    console::info("logging");
    console::info(&format!("  verbose: {}", config.verbose));
    console::info(&format!(
        "  log file: {}",
        config
            .log_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    ));

    Ok(())
}
