use crate::lockfile::LOCK_FILENAME;
use crate::{IppmError, Result};
use crate::persist::write_json_atomic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILENAME: &str = "ippm.json";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Keys ippm does not use, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub manifest_path: PathBuf,
    pub manifest: Manifest,
}

impl Project {
    /// Walks up from `start` to the nearest directory holding an
    /// `ippm.lock` or `ippm.json`.
    pub fn discover(start: &Path) -> Result<Self> {
        let mut current = Some(start);

        while let Some(dir) = current {
            if dir.join(LOCK_FILENAME).is_file() || dir.join(MANIFEST_FILENAME).is_file() {
                return Self::open(dir);
            }
            current = dir.parent();
        }

        Err(IppmError::ProjectMissing {
            path: start.to_path_buf(),
        })
    }

    /// Opens the project rooted at `root`. A missing manifest reads as empty.
    pub fn open(root: &Path) -> Result<Self> {
        let manifest_path = root.join(MANIFEST_FILENAME);

        let manifest = if manifest_path.is_file() {
            let data = fs::read_to_string(&manifest_path).map_err(|source| IppmError::ReadFile {
                path: manifest_path.clone(),
                source,
            })?;

            serde_json::from_str(&data).map_err(|source| IppmError::ParseJson {
                path: manifest_path.clone(),
                source,
            })?
        } else {
            Manifest::default()
        };

        Ok(Project {
            root: root.to_path_buf(),
            manifest_path,
            manifest,
        })
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(LOCK_FILENAME)
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_json_atomic(&self.manifest_path, manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_nearest_project_upwards() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILENAME), "{\"packages\":{}}").unwrap();
        let nested = dir.path().join("src/lib");
        fs::create_dir_all(&nested).unwrap();

        let project = Project::discover(&nested).unwrap();
        assert_eq!(project.root, dir.path());
        assert!(project.manifest.dependencies.is_empty());
        assert_eq!(project.lock_path(), dir.path().join(LOCK_FILENAME));
    }

    #[test]
    fn reads_manifest_dependencies() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILENAME),
            r#"{"name":"app","dependencies":{"left-pad":"^1.0.0"}}"#,
        )
        .unwrap();

        let project = Project::discover(dir.path()).unwrap();
        assert_eq!(project.manifest.name.as_deref(), Some("app"));
        assert_eq!(project.manifest.dependencies["left-pad"], "^1.0.0");
    }

    #[test]
    fn missing_project_is_not_found() {
        let dir = tempdir().unwrap();
        let err = Project::discover(dir.path()).unwrap_err();
        assert!(matches!(err, IppmError::ProjectMissing { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn manifest_round_trips() {
        let dir = tempdir().unwrap();
        let project = Project::open(dir.path()).unwrap();
        let mut manifest = project.manifest.clone();
        manifest.dependencies.insert("a".into(), "^1.0.0".into());
        project.write_manifest(&manifest).unwrap();

        let reopened = Project::open(dir.path()).unwrap();
        assert_eq!(reopened.manifest.dependencies["a"], "^1.0.0");
    }

    #[test]
    fn unknown_manifest_keys_survive_a_rewrite() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILENAME),
            r#"{"name":"app","description":"keep me","scripts":{"start":"node ."}}"#,
        )
        .unwrap();

        let project = Project::open(dir.path()).unwrap();
        let mut manifest = project.manifest.clone();
        manifest.dependencies.insert("a".into(), "^1.0.0".into());
        project.write_manifest(&manifest).unwrap();

        let written: Value =
            serde_json::from_str(&fs::read_to_string(&project.manifest_path).unwrap()).unwrap();
        assert_eq!(written["description"], "keep me");
        assert_eq!(written["scripts"]["start"], "node .");
        assert_eq!(written["dependencies"]["a"], "^1.0.0");
        assert_eq!(written["name"], "app");
    }
}
