use crate::persist::write_json_atomic;
use crate::{IppmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

pub mod gc;

pub use gc::gc;

pub const LOCK_FILENAME: &str = "ippm.lock";
pub const ROOT_IDENTITY: &str = "";
pub const DEFAULT_MAIN: &str = "index.js";

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        PackageId {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Splits `name@version`, keeping the leading `@` of scoped names.
    pub fn parse(identity: &str) -> Option<Self> {
        let at = identity.rfind('@').filter(|at| *at > 0)?;
        let (name, version) = (&identity[..at], &identity[at + 1..]);
        if version.is_empty() {
            return None;
        }
        Some(PackageId::new(name, version))
    }

    pub fn identity(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

fn default_main() -> String {
    DEFAULT_MAIN.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    #[serde(default = "default_main")]
    pub main: String,
    #[serde(default, alias = "ipfs", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Default for PackageRecord {
    fn default() -> Self {
        PackageRecord {
            main: default_main(),
            address: None,
            dependencies: BTreeMap::new(),
        }
    }
}

impl PackageRecord {
    pub fn new(main: Option<&str>, address: impl Into<String>) -> Self {
        PackageRecord {
            main: main
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_MAIN)
                .to_string(),
            address: Some(address.into()),
            dependencies: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    #[serde(default)]
    pub packages: BTreeMap<String, PackageRecord>,
}

impl Default for Lock {
    fn default() -> Self {
        Lock::new()
    }
}

impl Lock {
    pub fn new() -> Self {
        let mut packages = BTreeMap::new();
        packages.insert(ROOT_IDENTITY.to_string(), PackageRecord::default());
        Lock { packages }
    }

    pub fn from_json(path: &Path, data: &str) -> Result<Self> {
        let mut lock: Lock = serde_json::from_str(data).map_err(|source| IppmError::ParseJson {
            path: path.to_path_buf(),
            source,
        })?;

        lock.packages
            .entry(ROOT_IDENTITY.to_string())
            .or_default();

        Ok(lock)
    }

    pub fn root(&self) -> &PackageRecord {
        static EMPTY_ROOT: LazyLock<PackageRecord> = LazyLock::new(PackageRecord::default);
        self.packages.get(ROOT_IDENTITY).unwrap_or(&EMPTY_ROOT)
    }

    pub fn root_mut(&mut self) -> &mut PackageRecord {
        self.packages.entry(ROOT_IDENTITY.to_string()).or_default()
    }

    pub fn get(&self, identity: &str) -> Option<&PackageRecord> {
        self.packages.get(identity)
    }

    pub fn insert(&mut self, id: &PackageId, record: PackageRecord) {
        self.packages.insert(id.identity(), record);
    }

    /// Identity bound to `name` in the dependency mapping of `identity`.
    pub fn dependency_of(&self, identity: &str, name: &str) -> Option<PackageId> {
        let version = self.packages.get(identity)?.dependencies.get(name)?;
        Some(PackageId::new(name, version.clone()))
    }

    /// Every dependency edge must point at a record in this lock.
    pub fn validate(&self) -> Result<()> {
        for (identity, record) in self.packages.iter() {
            for (name, version) in record.dependencies.iter() {
                let dependency = PackageId::new(name.as_str(), version.as_str()).identity();
                if !self.packages.contains_key(&dependency) {
                    return Err(IppmError::CorruptLock {
                        identity: identity.clone(),
                        dependency,
                    });
                }
            }
        }

        Ok(())
    }

    /// Number of records, root included. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// True when the lock holds nothing but the root record.
    pub fn has_only_root(&self) -> bool {
        self.packages.len() == 1 && self.packages.contains_key(ROOT_IDENTITY)
    }
}

pub fn read(path: &Path) -> Result<Lock> {
    let data = fs::read_to_string(path).map_err(|source| IppmError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    let lock = Lock::from_json(path, &data)?;
    lock.validate()?;
    Ok(lock)
}

/// Reads the lock at `path`, or starts a fresh root-only lock when the
/// file does not exist yet.
pub fn read_or_default(path: &Path) -> Result<Lock> {
    if path.is_file() {
        read(path)
    } else {
        Ok(Lock::new())
    }
}

pub fn write(path: &Path, lock: &Lock) -> Result<()> {
    write_json_atomic(path, lock)
}
