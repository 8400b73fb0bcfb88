use crate::lockfile::{self, Lock, LOCK_FILENAME};
use crate::store::{PackageStore, normalize_path};
use crate::{IppmError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod specifier;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(PathBuf),
    /// The host should apply its own default resolution.
    PassThrough,
}

/// Resolution context for one process: the project lock plus the store
/// of packages materialized so far.
#[derive(Debug)]
pub struct Resolver {
    lock: Lock,
    store: PackageStore,
}

impl Resolver {
    pub fn new(lock: Lock, store: PackageStore) -> Self {
        Resolver { lock, store }
    }

    /// Loads `<project_root>/ippm.lock` and roots the store at the project.
    pub fn load(project_root: &Path, store_root: &Path) -> Result<Self> {
        let lock = lockfile::read(&project_root.join(LOCK_FILENAME))?;
        let store = PackageStore::new(project_root, store_root);
        Ok(Resolver::new(lock, store))
    }

    pub fn resolve(&mut self, specifier: &str, requesting_file: &Path) -> Result<Resolution> {
        resolve(&self.lock, &mut self.store, specifier, requesting_file)
    }

    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }
}

/// Maps a bare specifier imported from `requesting_file` onto the exact
/// dependency version recorded for the importing package. Only the
/// importer's own dependency mapping is consulted.
pub fn resolve(
    lock: &Lock,
    store: &mut PackageStore,
    request: &str,
    requesting_file: &Path,
) -> Result<Resolution> {
    if specifier::is_pass_through(request) {
        return Ok(Resolution::PassThrough);
    }

    let Some(owner) = store.owner_of(requesting_file) else {
        return Ok(Resolution::PassThrough);
    };
    let owner = owner.identity.clone();

    let Some(bare) = specifier::parse(request) else {
        return Ok(Resolution::PassThrough);
    };

    let Some(owner_record) = lock.get(&owner) else {
        return Ok(Resolution::PassThrough);
    };

    let Some(version) = owner_record.dependencies.get(bare.name) else {
        return Err(IppmError::DependencyNotFound {
            requester: owner,
            name: bare.name.to_string(),
        });
    };

    let identity = format!("{}@{}", bare.name, version);
    let record = lock.get(&identity).ok_or_else(|| IppmError::CorruptLock {
        identity: owner.clone(),
        dependency: identity.clone(),
    })?;

    let package_dir = match store.get(&identity) {
        Some(path) => path.to_path_buf(),
        None => {
            let address = record
                .address
                .as_deref()
                .ok_or_else(|| IppmError::MissingAddress {
                    identity: identity.clone(),
                })?;
            store.materialize(&identity, address)
        }
    };

    let entry = bare.subpath.unwrap_or(record.main.as_str());
    crate::console::verbose(&format!(
        "resolve: {} from {} -> {} ({})",
        request,
        if owner.is_empty() { "root" } else { owner.as_str() },
        identity,
        entry
    ));

    Ok(Resolution::Resolved(complete_entry(
        normalize_path(&package_dir.join(entry)),
    )))
}

/// Directories resolve to their `index.js`; extensionless files get `.js`.
fn complete_entry(path: PathBuf) -> PathBuf {
    if path.is_dir() {
        return path.join("index.js");
    }

    if path.extension().is_none() {
        let mut raw: OsString = path.into_os_string();
        raw.push(".js");
        return PathBuf::from(raw);
    }

    path
}
