use crate::cache::AddressCache;
use crate::console;
use crate::content::{ContentStore, IpfsStore};
use crate::ingest::RetryPolicy;
use crate::lockfile::{self, PackageId};
use crate::registry::{HttpRegistry, Registry};
use crate::{IppmConfig, Project, Result};
use std::collections::BTreeMap;
use std::time::Instant;

pub mod closure;
pub mod request;

pub use closure::*;
pub use request::*;

#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Package arguments; empty installs every manifest dependency.
    pub requested: Vec<String>,
    /// Record the requested packages in `ippm.json`.
    pub save: bool,
}

#[derive(Debug, Clone)]
pub struct InstallResult {
    pub added: Vec<PackageId>,
    pub package_count: usize,
    pub elapsed_seconds: f32,
}

pub async fn install(
    config: &IppmConfig,
    project: &mut Project,
    options: InstallOptions,
) -> Result<InstallResult> {
    let registry = HttpRegistry::new(config);
    let content = IpfsStore::new(config);
    let cache = AddressCache::new(&config.cache_dir());

    install_with(
        &registry,
        &content,
        &cache,
        RetryPolicy::from_config(config),
        project,
        options,
    )
    .await
}

/// Adds every requested package to the project lock, points the root at
/// the chosen versions, prunes unreachable records and writes the lock.
/// Nothing is written when any package fails.
pub async fn install_with(
    registry: &dyn Registry,
    content: &dyn ContentStore,
    cache: &AddressCache,
    policy: RetryPolicy,
    project: &mut Project,
    options: InstallOptions,
) -> Result<InstallResult> {
    let started = Instant::now();

    let requested = if options.requested.is_empty() {
        manifest_specs(&project.manifest.dependencies)
    } else {
        options.requested.clone()
    };

    console::verbose(&format!(
        "install start: root={} requested=[{}] save={}",
        project.root.display(),
        requested.join(", "),
        options.save
    ));

    let lock_path = project.lock_path();
    let mut lock = lockfile::read_or_default(&lock_path)?;

    let mut installer = Installer::new(registry, content, cache, policy);
    let mut added = Vec::new();
    let mut saved = BTreeMap::new();

    for raw in requested.iter() {
        let request = PackageRequest::parse(raw)?;
        let package = installer.add(&request, &mut lock).await?;

        lock.root_mut()
            .dependencies
            .insert(package.id.name.clone(), package.id.version.clone());
        console::added(&package.id.name, &package.id.version);

        if options.save {
            saved.insert(
                request.name.clone(),
                request.saved_range(&package.id.version),
            );
        }
        added.push(package.id);
    }

    let before = lock.len();
    let lock = lockfile::gc(&lock);
    console::verbose(&format!(
        "gc removed {} unreachable records",
        before - lock.len()
    ));

    lockfile::write(&lock_path, &lock)?;

    if !saved.is_empty() {
        let mut manifest = project.manifest.clone();
        manifest.dependencies.extend(saved);
        project.write_manifest(&manifest)?;
        project.manifest = manifest;
    }

    let elapsed_seconds = started.elapsed().as_secs_f32();
    console::verbose(&format!(
        "install finished: {} packages in {:.3}s",
        lock.len() - 1,
        elapsed_seconds
    ));

    Ok(InstallResult {
        added,
        package_count: lock.len() - 1,
        elapsed_seconds,
    })
}
