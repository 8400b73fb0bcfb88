use crate::{IppmError, Result};
use async_trait::async_trait;

pub mod ipfs;

pub use ipfs::IpfsStore;

/// Name of the synthesized directory every package tree is inserted under.
pub const ROOT_NODE: &str = "root";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeFile {
    pub path: String,
    pub contents: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertedNode {
    pub path: String,
    pub address: String,
}

/// Content-addressed object store the package trees live in.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Inserts `files` as one tree and lists every node created.
    async fn insert(&self, files: Vec<TreeFile>) -> Result<Vec<InsertedNode>>;

    async fn fetch(&self, address: &str, path: &str) -> Result<Vec<u8>>;
}

/// Address of the synthesized root directory. Insert responses are not
/// ordered, so the node is picked by path.
pub fn root_address(nodes: &[InsertedNode]) -> Result<String> {
    nodes
        .iter()
        .find(|node| node.path == ROOT_NODE)
        .map(|node| node.address.clone())
        .ok_or_else(|| IppmError::StoreInsert {
            reason: format!("could not find \"{}\" node in insert response", ROOT_NODE),
        })
}
