use super::{ContentStore, InsertedNode, TreeFile};
use crate::config::IppmConfig;
use crate::console;
use crate::registry::http_client;
use crate::{IppmError, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Instant;

/// Client for the IPFS HTTP API.
#[derive(Clone, Debug)]
pub struct IpfsStore {
    client: Client,
    api: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AddResponseLine {
    name: String,
    hash: String,
}

impl IpfsStore {
    pub fn new(config: &IppmConfig) -> Self {
        IpfsStore {
            client: http_client(),
            api: config.store_api.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, command: &str) -> String {
        format!("{}/api/v0/{}", self.api, command)
    }
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn insert(&self, files: Vec<TreeFile>) -> Result<Vec<InsertedNode>> {
        let url = self.endpoint("add?pin=true&progress=false&wrap-with-directory=false");
        let started = Instant::now();
        let file_count = files.len();

        let mut form = Form::new();
        for dir in directories(&files) {
            let part = Part::bytes(Vec::new())
                .file_name(urlencoding::encode(&dir).into_owned())
                .mime_str("application/x-directory")
                .map_err(|source| IppmError::Http {
                    url: url.clone(),
                    source,
                })?;
            form = form.part("file", part);
        }
        for file in files {
            let part = Part::bytes(file.contents)
                .file_name(urlencoding::encode(&file.path).into_owned())
                .mime_str("application/octet-stream")
                .map_err(|source| IppmError::Http {
                    url: url.clone(),
                    source,
                })?;
            form = form.part("file", part);
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|source| IppmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| IppmError::Http {
            url: url.clone(),
            source,
        })?;

        if !status.is_success() {
            return Err(IppmError::StoreInsert {
                reason: format!("status {}: {}", status.as_u16(), body.trim()),
            });
        }

        let nodes = parse_add_response(&body)?;
        console::verbose(&format!(
            "store insert: {} files, {} nodes in {:.3}s",
            file_count,
            nodes.len(),
            started.elapsed().as_secs_f64()
        ));

        Ok(nodes)
    }

    async fn fetch(&self, address: &str, path: &str) -> Result<Vec<u8>> {
        let target = format!("/ipfs/{}/{}", address, path.trim_start_matches('/'));
        let url = format!(
            "{}?arg={}",
            self.endpoint("cat"),
            urlencoding::encode(&target)
        );

        let fail = |reason: String| IppmError::StoreFetch {
            address: address.to_string(),
            path: path.to_string(),
            reason,
        };

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;

        if !status.is_success() {
            return Err(fail(format!(
                "status {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&bytes).trim()
            )));
        }

        Ok(bytes.to_vec())
    }
}

/// Every ancestor directory of every file, parents first.
fn directories(files: &[TreeFile]) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();

    for file in files {
        let mut end = 0;
        while let Some(offset) = file.path[end..].find('/') {
            end += offset;
            dirs.insert(file.path[..end].to_string());
            end += 1;
        }
    }

    dirs
}

/// The add endpoint streams one JSON object per line.
fn parse_add_response(body: &str) -> Result<Vec<InsertedNode>> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<AddResponseLine>(line)
                .map(|parsed| InsertedNode {
                    path: parsed.name,
                    address: parsed.hash,
                })
                .map_err(|e| IppmError::StoreInsert {
                    reason: format!("unreadable insert response line {:?}: {}", line, e),
                })
        })
        .collect()
}
