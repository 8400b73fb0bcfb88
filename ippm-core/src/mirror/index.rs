use crate::persist::{read_json, write_json_atomic};
use crate::registry;
use crate::{IppmError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Three hex digits of fan-out.
const SHARD_COUNT: usize = 16 * 16 * 16;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub version: String,
    #[serde(alias = "ipfs")]
    pub address: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    versions: Vec<IndexEntry>,
}

/// Persistent `name -> [{version, address}]` index of mirrored packages.
/// Files live at `<dir>/<a>/<b>/<c>/<name>.json`, where `abc` are the
/// first hex digits of the name's MD5. Each shard has its own lock, so
/// only packages hashing to the same shard contend.
#[derive(Debug)]
pub struct RegistryIndex {
    dir: PathBuf,
    shards: Vec<RwLock<()>>,
}

impl RegistryIndex {
    pub fn new(dir: &Path) -> Self {
        RegistryIndex {
            dir: dir.to_path_buf(),
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(())).collect(),
        }
    }

    /// Index file for `name`. Names that are not valid registry names
    /// could resolve outside the index directory and are refused.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        if !registry::is_valid_name(name) {
            return Err(IppmError::MalformedUpstream {
                name: name.to_string(),
                reason: "invalid package name".to_string(),
            });
        }

        let (prefix, _) = shard_of(name);
        Ok(self
            .dir
            .join(&prefix[0..1])
            .join(&prefix[1..2])
            .join(&prefix[2..3])
            .join(format!("{}.json", name)))
    }

    pub async fn versions(&self, name: &str) -> Result<Vec<IndexEntry>> {
        let _guard = self.shard(name).read().await;
        self.load(name)
    }

    pub async fn contains(&self, name: &str, version: &str) -> Result<bool> {
        Ok(self
            .versions(name)
            .await?
            .iter()
            .any(|entry| entry.version == version))
    }

    /// Appends `version` unless it is already indexed. Returns whether the
    /// index changed.
    pub async fn record(&self, name: &str, version: &str, address: &str) -> Result<bool> {
        let _guard = self.shard(name).write().await;

        let mut versions = self.load(name)?;
        if versions.iter().any(|entry| entry.version == version) {
            return Ok(false);
        }

        versions.push(IndexEntry {
            version: version.to_string(),
            address: address.to_string(),
        });
        versions.sort_by(|a, b| ippm_semver::compare(&a.version, &b.version));

        write_json_atomic(&self.path_for(name)?, &IndexFile { versions })?;
        Ok(true)
    }

    fn load(&self, name: &str) -> Result<Vec<IndexEntry>> {
        let file: IndexFile = read_json(&self.path_for(name)?)?.unwrap_or_default();

        let mut versions: Vec<IndexEntry> = Vec::with_capacity(file.versions.len());
        for entry in file.versions {
            if !versions.iter().any(|seen| seen.version == entry.version) {
                versions.push(entry);
            }
        }

        Ok(versions)
    }

    fn shard(&self, name: &str) -> &RwLock<()> {
        let (_, index) = shard_of(name);
        &self.shards[index]
    }
}

/// Hex shard prefix and lock slot for `name`. MD5 is used for fan-out only.
pub fn shard_of(name: &str) -> (String, usize) {
    let digest = format!("{:x}", md5::compute(name.as_bytes()));
    let prefix = digest[0..3].to_string();
    let index = usize::from_str_radix(&prefix, 16).unwrap_or(0) % SHARD_COUNT;
    (prefix, index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn shards_by_md5_prefix() {
        let (prefix, index) = shard_of("left-pad");
        assert_eq!(prefix, format!("{:x}", md5::compute(b"left-pad"))[0..3]);
        assert_eq!(index, usize::from_str_radix(&prefix, 16).unwrap());

        let index = RegistryIndex::new(Path::new("/ws/repo"));
        let path = index.path_for("@scope/pkg").unwrap();
        let (p, _) = shard_of("@scope/pkg");
        let expected = PathBuf::from("/ws/repo")
            .join(&p[0..1])
            .join(&p[1..2])
            .join(&p[2..3])
            .join("@scope/pkg.json");
        assert_eq!(path, expected);
    }

    #[tokio::test]
    async fn refuses_names_outside_the_index() {
        let dir = tempdir().unwrap();
        let index = RegistryIndex::new(&dir.path().join("repo"));

        let err = index
            .record("../../../../escaped", "1.0.0", "QmA")
            .await
            .unwrap_err();
        assert!(err.is_permanent());
        assert!(index.versions("..").await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn keeps_versions_unique_and_sorted() {
        let dir = tempdir().unwrap();
        let index = RegistryIndex::new(dir.path());

        assert!(index.record("a", "1.10.0", "QmC").await.unwrap());
        assert!(index.record("a", "1.2.0", "QmB").await.unwrap());
        assert!(index.record("a", "1.0.0", "QmA").await.unwrap());
        assert!(!index.record("a", "1.2.0", "QmOther").await.unwrap());

        let versions = index.versions("a").await.unwrap();
        let listed: Vec<(&str, &str)> = versions
            .iter()
            .map(|e| (e.version.as_str(), e.address.as_str()))
            .collect();
        assert_eq!(
            listed,
            vec![("1.0.0", "QmA"), ("1.2.0", "QmB"), ("1.10.0", "QmC")]
        );
        assert!(index.contains("a", "1.10.0").await.unwrap());
        assert!(!index.contains("b", "1.0.0").await.unwrap());
    }

    #[tokio::test]
    async fn reads_legacy_entries() {
        let dir = tempdir().unwrap();
        let index = RegistryIndex::new(dir.path());
        let path = index.path_for("a").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"versions":[{"version":"1.0.0","ipfs":"QmA"},{"version":"1.0.0","ipfs":"QmDup"}]}"#,
        )
        .unwrap();

        let versions = index.versions("a").await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].address, "QmA");
    }

    #[tokio::test]
    async fn concurrent_writers_lose_nothing() {
        let dir = tempdir().unwrap();
        let index = Arc::new(RegistryIndex::new(dir.path()));

        let mut handles = Vec::new();
        for minor in 0..16 {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                index
                    .record("shared", &format!("1.{}.0", minor), "Qm")
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(index.versions("shared").await.unwrap().len(), 16);
    }
}
