use super::request::{PackageRequest, VersionRequest};
use crate::cache::AddressCache;
use crate::console;
use crate::content::ContentStore;
use crate::ingest::{self, RetryPolicy};
use crate::lockfile::{Lock, PackageId, PackageRecord};
use crate::registry::{Registry, RegistryDist, RegistryPackage, RegistryVersion};
use crate::{IppmError, Result};
use async_recursion::async_recursion;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct AddedPackage {
    pub id: PackageId,
    pub meta: RegistryVersion,
}

/// Adds packages and their transitive dependencies to a lock. Metadata is
/// fetched at most once per package name for the lifetime of the installer,
/// which is one install run.
pub struct Installer<'a> {
    registry: &'a dyn Registry,
    content: &'a dyn ContentStore,
    cache: &'a AddressCache,
    policy: RetryPolicy,
    metadata: HashMap<String, RegistryPackage>,
    visited: HashSet<String>,
}

impl<'a> Installer<'a> {
    pub fn new(
        registry: &'a dyn Registry,
        content: &'a dyn ContentStore,
        cache: &'a AddressCache,
        policy: RetryPolicy,
    ) -> Self {
        Installer {
            registry,
            content,
            cache,
            policy,
            metadata: HashMap::new(),
            visited: HashSet::new(),
        }
    }

    pub async fn add_package(&mut self, spec: &str, lock: &mut Lock) -> Result<AddedPackage> {
        let request = PackageRequest::parse(spec)?;
        self.add(&request, lock).await
    }

    /// Records `request` and everything it depends on in `lock`. A record
    /// is only written once all of its dependencies were added, so an
    /// error never leaves a half-filled record behind.
    #[async_recursion]
    pub async fn add(&mut self, request: &PackageRequest, lock: &mut Lock) -> Result<AddedPackage> {
        let meta = self.select(request).await?;
        let id = PackageId::new(request.name.as_str(), meta.version.as_str());

        if !self.visited.insert(id.identity()) {
            return Ok(AddedPackage { id, meta });
        }

        let address = self.address_for(&id, &meta.dist).await?;
        let mut record = PackageRecord::new(meta.main.as_deref(), address);

        for (dep_name, dep_range) in meta.dependencies.iter() {
            let dep_request = PackageRequest::parse(&format!("{}@{}", dep_name, dep_range))?;
            let dep = self.add(&dep_request, lock).await?;
            record
                .dependencies
                .insert(dep_name.clone(), dep.id.version.clone());
        }

        console::verbose(&format!(
            "locked {} with {} dependencies",
            id,
            record.dependencies.len()
        ));
        lock.insert(&id, record);

        Ok(AddedPackage { id, meta })
    }

    async fn select(&mut self, request: &PackageRequest) -> Result<RegistryVersion> {
        if !self.metadata.contains_key(&request.name) {
            let fetched = self.registry.package(&request.name).await?;
            self.metadata.insert(request.name.clone(), fetched);
        }

        match self.metadata.get(&request.name) {
            Some(package) => select_version(request, package),
            None => Err(IppmError::NoMatchingVersion {
                spec: request.to_string(),
            }),
        }
    }

    async fn address_for(&self, id: &PackageId, dist: &RegistryDist) -> Result<String> {
        if let Some(address) = self.cache.get(&id.name, &id.version).await? {
            console::verbose(&format!("reusing {} from cache ({})", id, address));
            return Ok(address);
        }

        let address = ingest::ingest(self.registry, self.content, id, dist, self.policy).await?;
        self.cache.put(&id.name, &id.version, &address).await?;

        Ok(address)
    }
}

pub fn select_version(request: &PackageRequest, package: &RegistryPackage) -> Result<RegistryVersion> {
    let no_match = || IppmError::NoMatchingVersion {
        spec: request.to_string(),
    };

    let version = match &request.version {
        VersionRequest::Version(version) => version.as_str(),
        VersionRequest::Tag(tag) => package
            .dist_tags
            .get(tag)
            .map(String::as_str)
            .ok_or_else(|| IppmError::TagNotFound {
                name: request.name.clone(),
                tag: tag.clone(),
            })?,
        VersionRequest::Range(range) => range
            .max_satisfying(package.versions.keys().map(String::as_str))
            .ok_or_else(no_match)?,
    };

    package.versions.get(version).cloned().ok_or_else(no_match)
}

/// Root dependency specs declared by a manifest, as `name@range` strings.
pub fn manifest_specs(dependencies: &BTreeMap<String, String>) -> Vec<String> {
    dependencies
        .iter()
        .map(|(name, range)| format!("{}@{}", name, range))
        .collect()
}
