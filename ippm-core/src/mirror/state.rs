use crate::lockfile::PackageId;
use crate::persist::{read_json, write_json_atomic};
use crate::registry::{RegistryDist, Sequence};
use crate::{IppmError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// One package version announced by the change feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,
    pub tarball: String,
    pub seq: Sequence,
}

impl Candidate {
    pub fn id(&self) -> PackageId {
        PackageId::new(self.name.as_str(), self.version.as_str())
    }

    pub fn dist(&self) -> RegistryDist {
        RegistryDist {
            tarball: self.tarball.clone(),
            shasum: self.shasum.clone(),
            integrity: self.integrity.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    #[serde(default)]
    pub retries: u32,
}

/// Crash-resumption state, rewritten after every batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionState {
    #[serde(default)]
    pub cursor: Sequence,
    #[serde(default)]
    pub failure_queue: Vec<FailedCandidate>,
}

impl IngestionState {
    /// Reads `state_path`. Without one, the cursor falls back to a
    /// plain-text `legacy_seq` file, then to the start of the feed.
    pub fn load(state_path: &Path, legacy_seq: &Path) -> Result<Self> {
        if let Some(state) = read_json(state_path)? {
            return Ok(state);
        }

        let cursor = match fs::read_to_string(legacy_seq) {
            Ok(raw) => Sequence::parse(&raw).unwrap_or_default(),
            Err(err) if err.kind() == ErrorKind::NotFound => Sequence::default(),
            Err(source) => {
                return Err(IppmError::ReadFile {
                    path: legacy_seq.to_path_buf(),
                    source,
                });
            }
        };

        Ok(IngestionState {
            cursor,
            failure_queue: Vec::new(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn candidate() -> Candidate {
        Candidate {
            name: "a".into(),
            version: "1.0.0".into(),
            shasum: Some("abc".into()),
            integrity: None,
            tarball: "https://r/a/-/a-1.0.0.tgz".into(),
            seq: Sequence::Token("9-g1AA".into()),
        }
    }

    #[test]
    fn persists_cursor_and_queue() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let state = IngestionState {
            cursor: Sequence::Number(42),
            failure_queue: vec![FailedCandidate {
                candidate: candidate(),
                retries: 3,
            }],
        };

        state.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["cursor"], 42);
        assert_eq!(raw["failureQueue"][0]["name"], "a");
        assert_eq!(raw["failureQueue"][0]["retries"], 3);
        assert_eq!(raw["failureQueue"][0]["seq"], "9-g1AA");

        let loaded = IngestionState::load(&path, &dir.path().join("seq")).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn falls_back_to_legacy_sequence_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("seq"), "1234\n").unwrap();

        let state =
            IngestionState::load(&dir.path().join("state.json"), &dir.path().join("seq")).unwrap();
        assert_eq!(state.cursor, Sequence::Number(1234));
        assert!(state.failure_queue.is_empty());
    }

    #[test]
    fn starts_from_zero_without_state() {
        let dir = tempdir().unwrap();
        let state =
            IngestionState::load(&dir.path().join("state.json"), &dir.path().join("seq")).unwrap();
        assert_eq!(state, IngestionState::default());
    }
}
