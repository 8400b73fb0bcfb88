use crate::{IppmError, Result};
use futures::lock::Mutex;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only `addlog` / `errorlog` files of the mirror.
#[derive(Debug)]
pub struct Journal {
    add_log: PathBuf,
    error_log: PathBuf,
    write_lock: Mutex<()>,
}

impl Journal {
    pub fn new(add_log: &Path, error_log: &Path) -> Self {
        Journal {
            add_log: add_log.to_path_buf(),
            error_log: error_log.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn added(&self, identity: &str, address: &str) -> Result<()> {
        tracing::info!(package = identity, address, "added");

        let line = json!({ "name": identity, "address": address }).to_string();
        self.append(&self.add_log, &format!("{}\n", line)).await
    }

    /// Logs a failed attempt; `skipped` marks the candidate as dropped for good.
    pub async fn failed(&self, identity: &str, error: &IppmError, skipped: bool) -> Result<()> {
        let mut text = format!("{} exception: {}\n", identity, error);

        if skipped {
            tracing::error!(package = identity, %error, "skipped");
            text.push_str(&format!("{}: skipped\n", identity));
        } else {
            tracing::warn!(package = identity, %error, "queued for retry");
        }

        self.append(&self.error_log, &text).await
    }

    async fn append(&self, path: &Path, text: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let write_err = |source: std::io::Error| IppmError::WriteFile {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(write_err)?;
        file.write_all(text.as_bytes()).map_err(write_err)
    }
}
