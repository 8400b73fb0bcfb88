use crate::config::IppmConfig;
use crate::console;
use crate::content::{self, ContentStore};
use crate::lockfile::PackageId;
use crate::registry::{Registry, RegistryDist};
use crate::tarball::{self, Checksums};
use crate::{IppmError, Result};
use std::time::{Duration, Instant};

/// How often a transient network failure is retried within one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &IppmConfig) -> Self {
        RetryPolicy {
            attempts: config.fetch_attempts.max(1),
            delay: config.retry_delay(),
        }
    }

    pub fn once() -> Self {
        RetryPolicy {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Downloads, verifies and unpacks one package version and inserts it into
/// the content store. Returns the address of the inserted root node.
pub async fn ingest(
    registry: &dyn Registry,
    store: &dyn ContentStore,
    id: &PackageId,
    dist: &RegistryDist,
    policy: RetryPolicy,
) -> Result<String> {
    let checksums = Checksums::from(dist);
    if checksums.is_empty() {
        return Err(IppmError::MalformedUpstream {
            name: id.identity(),
            reason: "no checksum published for tarball".to_string(),
        });
    }

    let mut attempt = 1;
    loop {
        match ingest_once(registry, store, id, &dist.tarball, &checksums).await {
            Ok(address) => return Ok(address),
            Err(err) if err.is_transient() && attempt < policy.attempts => {
                console::verbose(&format!(
                    "ingest {} attempt {}/{} failed: {}",
                    id, attempt, policy.attempts, err
                ));
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn ingest_once(
    registry: &dyn Registry,
    store: &dyn ContentStore,
    id: &PackageId,
    url: &str,
    checksums: &Checksums,
) -> Result<String> {
    let started = Instant::now();

    let stream = registry.tarball(url).await?;
    let data = tarball::read_verified(stream, url, checksums).await?;
    let files = tarball::extract(&data, id, url)?;
    let file_count = files.len();

    let nodes = store.insert(files).await?;
    let address = content::root_address(&nodes)?;

    console::verbose(&format!(
        "ingested {} ({} bytes, {} files) as {} in {:.3}s",
        id,
        data.len(),
        file_count,
        address,
        started.elapsed().as_secs_f64()
    ));

    Ok(address)
}
