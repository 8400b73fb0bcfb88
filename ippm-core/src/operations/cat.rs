use crate::content::{ContentStore, IpfsStore};
use crate::lockfile::{self, Lock};
use crate::{IppmConfig, IppmError, Project, Result, console};

pub async fn cat(
    config: &IppmConfig,
    project: &Project,
    package: &str,
    path: Option<&str>,
) -> Result<Vec<u8>> {
    let lock = lockfile::read(&project.lock_path())?;
    let store = IpfsStore::new(config);
    cat_with(&store, &lock, package, path).await
}

/// Reads `path` (default: the package's main entry) of an installed
/// package straight from the content store. `package` is either an
/// identity or the name of a root dependency.
pub async fn cat_with(
    store: &dyn ContentStore,
    lock: &Lock,
    package: &str,
    path: Option<&str>,
) -> Result<Vec<u8>> {
    let identity = if lock.get(package).is_some() {
        package.to_string()
    } else {
        lock.dependency_of(lockfile::ROOT_IDENTITY, package)
            .map(|id| id.identity())
            .ok_or_else(|| IppmError::DependencyNotFound {
                requester: lockfile::ROOT_IDENTITY.to_string(),
                name: package.to_string(),
            })?
    };

    let record = lock
        .get(&identity)
        .ok_or_else(|| IppmError::DependencyNotFound {
            requester: lockfile::ROOT_IDENTITY.to_string(),
            name: identity.clone(),
        })?;

    let address = record
        .address
        .as_deref()
        .ok_or_else(|| IppmError::MissingAddress {
            identity: identity.clone(),
        })?;

    let relative = path
        .unwrap_or(record.main.as_str())
        .trim_start_matches("./")
        .trim_start_matches('/');

    console::verbose(&format!("cat {} {} from {}", identity, relative, address));

    store
        .fetch(address, &format!("{}/{}", identity, relative))
        .await
}
