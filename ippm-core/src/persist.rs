use crate::{IppmError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Reads a JSON file, treating a missing file as `None`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
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

    serde_json::from_str(&data)
        .map(Some)
        .map_err(|source| IppmError::ParseJson {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes `value` next to `path` and renames it into place, so readers
/// never observe a half-written file.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let write_err = |source: std::io::Error| IppmError::WriteFile {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(write_err)?;

    let data = serde_json::to_vec_pretty(value).map_err(|e| IppmError::SerializeJson {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(&data).map_err(write_err)?;
    file.write_all(b"\n").map_err(write_err)?;
    file.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}
