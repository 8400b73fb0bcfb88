use anyhow::Result;
use clap::Args;
use ippm_core::{IppmConfig, Mirror, console};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Directory for the registry index, state and logs
    #[arg(long = "dir")]
    pub dir: Option<PathBuf>,
    /// Feed changes fetched and processed per batch
    #[arg(long = "batch-size")]
    pub batch_size: Option<usize>,
}

pub async fn run(args: MirrorArgs, config: &IppmConfig) -> Result<()> {
    console::header("mirror", env!("CARGO_PKG_VERSION"));

    let mut config = config.clone();
    if let Some(dir) = args.dir {
        config.mirror_dir = dir;
    }
    if let Some(size) = args.batch_size.filter(|s| *s > 0) {
        config.batch_size = size;
    }

    console::step("feed", &config.feed_url);
    console::step("index", &config.index_dir().display().to_string());

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        wait_for_signal().await;
        console::info("finishing the current batch before exiting");
        flag.store(true, Ordering::SeqCst);
    });

    let mut mirror = Mirror::from_config(&config)?;
    mirror.run(&shutdown).await?;

    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        if let Ok(mut terminate) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
            return;
        }
    }

    let _ = tokio::signal::ctrl_c().await;
}
