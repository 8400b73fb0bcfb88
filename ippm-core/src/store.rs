use crate::config;
use crate::lockfile::ROOT_IDENTITY;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

pub const VENDOR_DIR: &str = "node_modules";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredPackage {
    pub identity: String,
    pub path: PathBuf,
}

/// Process-local map from package identity to the directory the package
/// is materialized at. Entries are only ever added.
#[derive(Debug)]
pub struct PackageStore {
    store_root: PathBuf,
    packages: Vec<StoredPackage>,
    by_identity: HashMap<String, usize>,
}

impl PackageStore {
    pub fn new(project_root: &Path, store_root: &Path) -> Self {
        let mut store = PackageStore {
            store_root: normalize_path(store_root),
            packages: Vec::new(),
            by_identity: HashMap::new(),
        };
        store.add(ROOT_IDENTITY, project_root);
        store
    }

    /// Registers `identity` at `path`. An identity that is already known
    /// keeps its first location.
    pub fn add(&mut self, identity: &str, path: &Path) -> &Path {
        let index = match self.by_identity.get(identity) {
            Some(index) => *index,
            None => {
                self.packages.push(StoredPackage {
                    identity: identity.to_string(),
                    path: normalize_path(path),
                });
                let index = self.packages.len() - 1;
                self.by_identity.insert(identity.to_string(), index);
                index
            }
        };

        &self.packages[index].path
    }

    /// Location of `identity`, derived from its content address on first use.
    pub fn materialize(&mut self, identity: &str, address: &str) -> PathBuf {
        if let Some(path) = self.get(identity) {
            return path.to_path_buf();
        }

        let path = config::materialized_path(&self.store_root, address, identity);
        self.add(identity, &path).to_path_buf()
    }

    pub fn get(&self, identity: &str) -> Option<&Path> {
        self.by_identity
            .get(identity)
            .map(|index| self.packages[*index].path.as_path())
    }

    pub fn root(&self) -> Option<&Path> {
        self.get(ROOT_IDENTITY)
    }

    /// Package whose directory is the longest prefix of `file`. Files
    /// inside a vendor directory belong to no package.
    pub fn owner_of(&self, file: &Path) -> Option<&StoredPackage> {
        let normalized = normalize_path(file);

        if normalized
            .components()
            .any(|c| c.as_os_str() == VENDOR_DIR)
        {
            return None;
        }

        self.packages
            .iter()
            .filter(|pkg| normalized.starts_with(&pkg.path) && normalized != pkg.path)
            .max_by_key(|pkg| pkg.path.components().count())
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching the
/// filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }

    out
}
