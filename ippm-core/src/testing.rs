//! In-memory registry, change feed and content store used by the tests.

use crate::content::{ContentStore, InsertedNode, ROOT_NODE, TreeFile};
use crate::registry::{
    ByteStream, ChangeFeed, FeedBatch, FeedChange, Registry, RegistryDist, RegistryPackage,
    RegistryVersion, Sequence,
};
use crate::{IppmError, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures::StreamExt;
use futures::stream;
use serde_json::json;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

#[derive(Default)]
pub struct FakeRegistry {
    packages: Mutex<HashMap<String, RegistryPackage>>,
    tarballs: Mutex<HashMap<String, Vec<u8>>>,
    downloads: AtomicUsize,
    metadata_requests: AtomicUsize,
    failing_downloads: AtomicUsize,
}

impl FakeRegistry {
    pub fn publish(
        &self,
        name: &str,
        version: &str,
        dependencies: &[(&str, &str)],
        files: &[(&str, &str)],
    ) -> RegistryVersion {
        let data = tarball(files);
        let url = format!("https://registry.test/{}/-/{}.tgz", name, version);
        let dist = RegistryDist {
            tarball: url.clone(),
            shasum: Some(sha1_hex(&data)),
            integrity: None,
        };

        let meta = RegistryVersion {
            name: Some(name.to_string()),
            version: version.to_string(),
            main: None,
            dependencies: dependencies
                .iter()
                .map(|(n, r)| (n.to_string(), r.to_string()))
                .collect(),
            dist,
        };

        self.tarballs.lock().unwrap().insert(url, data);

        let mut packages = self.packages.lock().unwrap();
        let package = packages.entry(name.to_string()).or_default();
        package.name = Some(name.to_string());
        package.versions.insert(version.to_string(), meta.clone());
        package
            .dist_tags
            .insert("latest".to_string(), version.to_string());

        meta
    }

    pub fn tag(&self, name: &str, tag: &str, version: &str) {
        let mut packages = self.packages.lock().unwrap();
        if let Some(package) = packages.get_mut(name) {
            package
                .dist_tags
                .insert(tag.to_string(), version.to_string());
        }
    }

    /// The next `count` tarball downloads fail with a transient error.
    pub fn fail_downloads(&self, count: usize) {
        self.failing_downloads.store(count, Ordering::SeqCst);
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata_requests.load(Ordering::SeqCst)
    }
}

pub fn published(
    registry: &FakeRegistry,
    name: &str,
    version: &str,
    files: &[(&str, &str)],
) -> (RegistryDist, RegistryVersion) {
    let meta = registry.publish(name, version, &[], files);
    (meta.dist.clone(), meta)
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn package(&self, name: &str) -> Result<RegistryPackage> {
        self.metadata_requests.fetch_add(1, Ordering::SeqCst);

        self.packages
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| IppmError::RegistryRejected {
                url: format!("https://registry.test/{}", name),
                message: "not_found".to_string(),
            })
    }

    async fn tarball(&self, url: &str) -> Result<ByteStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);

        let failing = self.failing_downloads.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_downloads.store(failing - 1, Ordering::SeqCst);
            return Err(IppmError::HttpStatus {
                url: url.to_string(),
                status: 503,
            });
        }

        let data = self
            .tarballs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| IppmError::RegistryRejected {
                url: url.to_string(),
                message: "not_found".to_string(),
            })?;

        let chunks: Vec<Result<Vec<u8>>> = data.chunks(64).map(|c| Ok(c.to_vec())).collect();
        Ok(stream::iter(chunks).boxed())
    }
}

#[derive(Default)]
pub struct FakeStore {
    trees: Mutex<HashMap<String, Vec<TreeFile>>>,
    inserts: AtomicUsize,
}

impl FakeStore {
    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn root_of(&self, identity: &str) -> Option<String> {
        let prefix = format!("{}/{}/", ROOT_NODE, identity);
        self.trees
            .lock()
            .unwrap()
            .iter()
            .find(|(_, files)| files.iter().any(|f| f.path.starts_with(&prefix)))
            .map(|(address, _)| address.clone())
    }

    pub fn read(&self, identity: &str, relative: &str) -> Option<Vec<u8>> {
        let path = format!("{}/{}/{}", ROOT_NODE, identity, relative);
        self.trees
            .lock()
            .unwrap()
            .values()
            .flatten()
            .find(|f| f.path == path)
            .map(|f| f.contents.clone())
    }
}

fn fake_address(parts: &[&[u8]]) -> String {
    let mut context = md5::Context::new();
    for part in parts {
        context.consume(part);
    }
    format!("Qm{:x}", context.compute())
}

#[async_trait]
impl ContentStore for FakeStore {
    async fn insert(&self, files: Vec<TreeFile>) -> Result<Vec<InsertedNode>> {
        self.inserts.fetch_add(1, Ordering::SeqCst);

        let mut parts: Vec<&[u8]> = Vec::new();
        for file in files.iter() {
            parts.push(file.path.as_bytes());
            parts.push(&file.contents);
        }
        let root = fake_address(&parts);

        let mut nodes: Vec<InsertedNode> = files
            .iter()
            .map(|f| InsertedNode {
                path: f.path.clone(),
                address: fake_address(&[f.path.as_bytes(), &f.contents]),
            })
            .collect();

        let dirs: BTreeSet<String> = files
            .iter()
            .filter_map(|f| f.path.rsplit_once('/').map(|(dir, _)| dir.to_string()))
            .filter(|dir| dir != ROOT_NODE)
            .collect();
        for dir in dirs {
            let address = fake_address(&[dir.as_bytes()]);
            nodes.push(InsertedNode { path: dir, address });
        }

        let middle = nodes.len() / 2;
        nodes.insert(
            middle,
            InsertedNode {
                path: ROOT_NODE.to_string(),
                address: root.clone(),
            },
        );

        self.trees.lock().unwrap().insert(root, files);
        Ok(nodes)
    }

    async fn fetch(&self, address: &str, path: &str) -> Result<Vec<u8>> {
        let full = format!("{}/{}", ROOT_NODE, path);
        self.trees
            .lock()
            .unwrap()
            .get(address)
            .and_then(|files| files.iter().find(|f| f.path == full))
            .map(|f| f.contents.clone())
            .ok_or_else(|| IppmError::StoreFetch {
                address: address.to_string(),
                path: path.to_string(),
                reason: "no such file".to_string(),
            })
    }
}

#[derive(Default)]
pub struct FakeFeed {
    batches: Mutex<VecDeque<Result<FeedBatch>>>,
    polls: AtomicUsize,
}

impl FakeFeed {
    pub fn push(&self, batch: FeedBatch) {
        self.batches.lock().unwrap().push_back(Ok(batch));
    }

    pub fn push_error(&self, error: IppmError) {
        self.batches.lock().unwrap().push_back(Err(error));
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for FakeFeed {
    async fn poll(&self, since: &Sequence, _limit: usize) -> Result<FeedBatch> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        match self.batches.lock().unwrap().pop_front() {
            Some(next) => next,
            None => Ok(FeedBatch {
                results: Vec::new(),
                last_seq: since.clone(),
            }),
        }
    }
}

/// A feed change whose document publishes `versions`.
pub fn change(seq: u64, name: &str, versions: &[&RegistryVersion]) -> FeedChange {
    let versions: BTreeMap<String, serde_json::Value> = versions
        .iter()
        .map(|meta| (meta.version.clone(), serde_json::to_value(meta).unwrap()))
        .collect();

    FeedChange {
        seq: Sequence::Number(seq),
        id: name.to_string(),
        deleted: false,
        doc: Some(json!({ "name": name, "versions": versions })),
    }
}

pub fn batch(last_seq: u64, results: Vec<FeedChange>) -> FeedBatch {
    FeedBatch {
        results,
        last_seq: Sequence::Number(last_seq),
    }
}
