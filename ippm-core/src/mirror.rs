use crate::config::IppmConfig;
use crate::console;
use crate::content::{ContentStore, IpfsStore};
use crate::ingest::{self, RetryPolicy};
use crate::registry::{
    self, ChangeFeed, CouchFeed, FeedBatch, FeedChange, HttpRegistry, Registry, RegistryVersion,
};
use crate::{IppmError, Result};
use futures::StreamExt;
use futures::stream;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub mod index;
pub mod journal;
pub mod state;

pub use index::{IndexEntry, RegistryIndex};
pub use journal::Journal;
pub use state::{Candidate, FailedCandidate, IngestionState};

#[derive(Clone, Copy, Debug)]
pub struct MirrorSettings {
    pub batch_size: usize,
    pub max_retries: u32,
    pub feed_retries: u32,
    pub feed_retry_delay: Duration,
    pub fetch: RetryPolicy,
}

impl MirrorSettings {
    pub fn from_config(config: &IppmConfig) -> Self {
        MirrorSettings {
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            feed_retries: config.feed_retries,
            feed_retry_delay: config.retry_delay(),
            fetch: RetryPolicy::from_config(config),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub added: usize,
    pub requeued: usize,
    pub skipped: usize,
}

/// Follows the upstream change feed and copies every new package version
/// into the content store and the registry index.
pub struct Mirror {
    feed: Arc<dyn ChangeFeed>,
    registry: Arc<dyn Registry>,
    store: Arc<dyn ContentStore>,
    index: RegistryIndex,
    journal: Journal,
    state: IngestionState,
    state_path: PathBuf,
    settings: MirrorSettings,
}

impl Mirror {
    pub fn new(
        config: &IppmConfig,
        feed: Arc<dyn ChangeFeed>,
        registry: Arc<dyn Registry>,
        store: Arc<dyn ContentStore>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.mirror_dir).map_err(|source| IppmError::WriteFile {
            path: config.mirror_dir.clone(),
            source,
        })?;

        let state = IngestionState::load(&config.state_path(), &config.legacy_seq_path())?;
        console::verbose(&format!(
            "mirror state: cursor={} queued={}",
            state.cursor,
            state.failure_queue.len()
        ));

        Ok(Mirror {
            feed,
            registry,
            store,
            index: RegistryIndex::new(&config.index_dir()),
            journal: Journal::new(&config.add_log_path(), &config.error_log_path()),
            state,
            state_path: config.state_path(),
            settings: MirrorSettings::from_config(config),
        })
    }

    /// Mirror wired to the HTTP registry, the CouchDB feed and IPFS.
    pub fn from_config(config: &IppmConfig) -> Result<Self> {
        Mirror::new(
            config,
            Arc::new(CouchFeed::new(config)),
            Arc::new(HttpRegistry::new(config)),
            Arc::new(IpfsStore::new(config)),
        )
    }

    pub fn state(&self) -> &IngestionState {
        &self.state
    }

    pub fn index(&self) -> &RegistryIndex {
        &self.index
    }

    /// Processes batches until `shutdown` is raised. The flag is checked
    /// between batches, so the state of a started batch is always saved.
    pub async fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        tracing::info!(cursor = %self.state.cursor, "mirror started");

        while !shutdown.load(Ordering::SeqCst) {
            let batch = self.poll_feed().await?;
            let report = self.apply(batch).await?;

            if report != BatchReport::default() {
                tracing::info!(
                    cursor = %self.state.cursor,
                    added = report.added,
                    requeued = report.requeued,
                    skipped = report.skipped,
                    "batch done"
                );
            }
        }

        tracing::info!(cursor = %self.state.cursor, "mirror stopped");
        Ok(())
    }

    /// Next batch after the cursor. Transient failures are retried up to
    /// `feed_retries` times before the feed counts as gone.
    pub async fn poll_feed(&self) -> Result<FeedBatch> {
        let mut failures = 0;

        loop {
            match self
                .feed
                .poll(&self.state.cursor, self.settings.batch_size)
                .await
            {
                Ok(batch) => return Ok(batch),
                Err(err) if err.is_transient() => {
                    failures += 1;
                    if failures > self.settings.feed_retries {
                        return Err(IppmError::FeedExhausted {
                            attempts: failures,
                            source: Box::new(err),
                        });
                    }

                    tracing::warn!(attempt = failures, error = %err, "change feed unavailable");
                    tokio::time::sleep(self.settings.feed_retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Ingests the queued failures and every new version in `batch`, then
    /// advances the cursor and persists the state.
    pub async fn apply(&mut self, batch: FeedBatch) -> Result<BatchReport> {
        let started = Instant::now();
        let pending = self.pending(&batch).await?;

        let this = &*self;
        let outcomes: Vec<(FailedCandidate, Result<String>)> = stream::iter(pending)
            .map(|entry| async move {
                let result = this.process(&entry.candidate).await;
                (entry, result)
            })
            .buffer_unordered(self.settings.batch_size)
            .collect()
            .await;

        let mut report = BatchReport::default();
        let mut failure_queue = Vec::new();

        for (mut entry, result) in outcomes {
            let identity = entry.candidate.id().identity();

            match result {
                Ok(_) => report.added += 1,
                Err(err) => {
                    entry.retries += 1;
                    let skipped = err.is_permanent() || entry.retries > self.settings.max_retries;
                    self.journal.failed(&identity, &err, skipped).await?;

                    if skipped {
                        report.skipped += 1;
                    } else {
                        report.requeued += 1;
                        failure_queue.push(entry);
                    }
                }
            }
        }

        self.state.failure_queue = failure_queue;
        self.state.cursor = batch.last_seq;
        self.state.save(&self.state_path)?;

        console::verbose(&format!(
            "batch up to {} finished in {:.3}s: {:?}",
            self.state.cursor,
            started.elapsed().as_secs_f64(),
            report
        ));

        Ok(report)
    }

    /// Queued failures first, then the batch's versions, minus anything
    /// already indexed or already pending.
    async fn pending(&self, batch: &FeedBatch) -> Result<Vec<FailedCandidate>> {
        let queued = self.state.failure_queue.iter().cloned();
        let announced = batch
            .results
            .iter()
            .flat_map(candidates)
            .map(|candidate| FailedCandidate {
                candidate,
                retries: 0,
            });

        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for entry in queued.chain(announced) {
            let identity = entry.candidate.id().identity();
            if !seen.insert(identity) || !registry::is_valid_name(&entry.candidate.name) {
                continue;
            }

            if self
                .index
                .contains(&entry.candidate.name, &entry.candidate.version)
                .await?
            {
                continue;
            }

            pending.push(entry);
        }

        Ok(pending)
    }

    async fn process(&self, candidate: &Candidate) -> Result<String> {
        let id = candidate.id();

        let address = ingest::ingest(
            self.registry.as_ref(),
            self.store.as_ref(),
            &id,
            &candidate.dist(),
            self.settings.fetch,
        )
        .await?;

        self.index
            .record(&candidate.name, &candidate.version, &address)
            .await?;
        self.journal.added(&id.identity(), &address).await?;

        Ok(address)
    }
}

/// Versions published by a feed change. Entries that do not parse or whose
/// version is not valid semver are dropped individually.
pub fn candidates(change: &FeedChange) -> Vec<Candidate> {
    if change.deleted {
        return Vec::new();
    }

    let Some(doc) = change.doc.as_ref() else {
        return Vec::new();
    };

    let Some(versions) = doc.get("versions").and_then(|v| v.as_object()) else {
        return Vec::new();
    };

    let doc_name = doc
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(change.id.as_str());

    if !registry::is_valid_name(doc_name) {
        tracing::warn!(package = doc_name, seq = %change.seq, "ignoring change with invalid package name");
        return Vec::new();
    }

    let mut found = Vec::new();

    for (raw_version, value) in versions {
        let meta: RegistryVersion = match serde_json::from_value(value.clone()) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::debug!(package = doc_name, version = %raw_version, error = %err, "unreadable version entry");
                continue;
            }
        };

        let Some(version) = ippm_semver::clean(raw_version) else {
            tracing::debug!(package = doc_name, version = %raw_version, "invalid version");
            continue;
        };

        if let Some(name) = meta.name.as_deref()
            && name != doc_name
        {
            tracing::warn!(package = doc_name, version = %raw_version, name, "version names another package");
            continue;
        }

        found.push(Candidate {
            name: doc_name.to_string(),
            version,
            shasum: meta.dist.shasum,
            integrity: meta.dist.integrity,
            tarball: meta.dist.tarball,
            seq: change.seq.clone(),
        });
    }

    found
}
