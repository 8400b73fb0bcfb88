use crate::{IppmError, Result};
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Optional JSON overrides stored at `<home>/config`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub registry: Option<String>,
    pub feed_url: Option<String>,
    pub store_api: Option<String>,
    pub store_root: Option<PathBuf>,
    pub mirror_dir: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub feed_retries: Option<u32>,
    pub fetch_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(IppmError::ReadFile {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file = serde_json::from_str(&data).map_err(|source| IppmError::ParseJson {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Some(file))
    }
}

pub fn normalize_url(value: &str) -> String {
    let mut url = if value.starts_with("//") {
        format!("https:{}", value)
    } else {
        value.trim().to_string()
    };

    while url.ends_with('/') {
        url.pop();
    }

    url
}
