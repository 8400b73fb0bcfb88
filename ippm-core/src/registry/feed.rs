use super::{classify_failure, http_client};
use crate::config::IppmConfig;
use crate::{IppmError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const LONGPOLL_TIMEOUT_MS: u64 = 60_000;

/// Position in the upstream change feed. CouchDB 1.x hands out integers,
/// later versions opaque strings; both are echoed back verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sequence {
    Number(u64),
    Token(String),
}

impl Default for Sequence {
    fn default() -> Self {
        Sequence::Number(0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sequence::Number(n) => write!(f, "{}", n),
            Sequence::Token(t) => write!(f, "{}", t),
        }
    }
}

impl Sequence {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(match trimmed.parse::<u64>() {
            Ok(n) => Sequence::Number(n),
            Err(_) => Sequence::Token(trimmed.to_string()),
        })
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeedChange {
    pub seq: Sequence,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    /// The package document, structurally identical to registry metadata.
    /// Kept untyped so one malformed version does not poison the batch.
    #[serde(default)]
    pub doc: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FeedBatch {
    #[serde(default)]
    pub results: Vec<FeedChange>,
    pub last_seq: Sequence,
}

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn poll(&self, since: &Sequence, limit: usize) -> Result<FeedBatch>;
}

/// CouchDB `_changes` long-poll client.
#[derive(Clone, Debug)]
pub struct CouchFeed {
    client: Client,
    db_url: String,
}

impl CouchFeed {
    pub fn new(config: &IppmConfig) -> Self {
        CouchFeed {
            client: http_client(),
            db_url: config.feed_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn changes_url(&self, since: &Sequence, limit: usize) -> String {
        format!(
            "{}/_changes?feed=longpoll&include_docs=true&since={}&limit={}&timeout={}",
            self.db_url,
            urlencoding::encode(&since.to_string()),
            limit,
            LONGPOLL_TIMEOUT_MS
        )
    }
}

#[async_trait]
impl ChangeFeed for CouchFeed {
    async fn poll(&self, since: &Sequence, limit: usize) -> Result<FeedBatch> {
        let url = self.changes_url(since, limit);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(LONGPOLL_TIMEOUT_MS * 2))
            .send()
            .await
            .map_err(|source| IppmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(&url, status, content_type.as_deref(), &body));
        }

        let body = response.text().await.map_err(|source| IppmError::Http {
            url: url.clone(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|e| IppmError::MalformedUpstream {
            name: "_changes".to_string(),
            reason: e.to_string(),
        })
    }
}
