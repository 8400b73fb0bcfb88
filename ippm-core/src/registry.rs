use crate::config::IppmConfig;
use crate::console;
use crate::{IppmError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use std::time::Instant;

pub mod feed;
pub mod types;

pub use feed::{ChangeFeed, CouchFeed, FeedBatch, FeedChange, Sequence};
pub use types::*;

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Upstream package registry: metadata documents and tarball downloads.
#[async_trait]
pub trait Registry: Send + Sync {
    async fn package(&self, name: &str) -> Result<RegistryPackage>;

    async fn tarball(&self, url: &str) -> Result<ByteStream>;
}

#[derive(Clone, Debug)]
pub struct HttpRegistry {
    client: Client,
    base: String,
}

impl HttpRegistry {
    pub fn new(config: &IppmConfig) -> Self {
        HttpRegistry::with_client(http_client(), &config.registry)
    }

    pub fn with_client(client: Client, base: &str) -> Self {
        HttpRegistry {
            client,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn package_url(&self, name: &str) -> String {
        format!("{}/{}", self.base, encode_package_name(name))
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn package(&self, name: &str) -> Result<RegistryPackage> {
        let url = self.package_url(name);
        console::verbose(&format!("registry request: name={} url={}", name, url));
        let started = Instant::now();

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await
            .map_err(|source| IppmError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        console::verbose(&format!(
            "registry response: name={} status={} in {:.3}s",
            name,
            status.as_u16(),
            started.elapsed().as_secs_f64()
        ));

        if !status.is_success() {
            return Err(failure_from_response(&url, response).await);
        }

        let body = response.text().await.map_err(|source| IppmError::Http {
            url: url.clone(),
            source,
        })?;

        let package: RegistryPackage =
            serde_json::from_str(&body).map_err(|e| IppmError::MalformedUpstream {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if package.versions.is_empty() {
            return Err(IppmError::MalformedUpstream {
                name: name.to_string(),
                reason: "package has no versions".to_string(),
            });
        }

        Ok(package)
    }

    async fn tarball(&self, url: &str) -> Result<ByteStream> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|source| IppmError::Http {
                    url: url.to_string(),
                    source,
                })?;

        if response.status().as_u16() != 200 {
            return Err(failure_from_response(url, response).await);
        }

        let owned_url = url.to_string();
        let stream = response.bytes_stream().map(move |chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|source| IppmError::Http {
                    url: owned_url.clone(),
                    source,
                })
        });

        Ok(stream.boxed())
    }
}

pub fn http_client() -> Client {
    Client::builder()
        .user_agent(concat!("ippm/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

async fn failure_from_response(url: &str, response: reqwest::Response) -> IppmError {
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();

    classify_failure(url, status, content_type.as_deref(), &body)
}

/// A JSON error body is a structured rejection by the registry; anything
/// else is reported as a plain transport failure.
pub fn classify_failure(
    url: &str,
    status: u16,
    content_type: Option<&str>,
    body: &str,
) -> IppmError {
    let is_json = content_type
        .map(|ct| ct.trim_start().starts_with("application/json"))
        .unwrap_or(false);

    if is_json && let Ok(parsed) = serde_json::from_str::<RegistryErrorBody>(body) {
        let message = parsed
            .error
            .or(parsed.reason)
            .unwrap_or_else(|| format!("HTTP status {}", status));

        return IppmError::RegistryRejected {
            url: url.to_string(),
            message,
        };
    }

    IppmError::HttpStatus {
        url: url.to_string(),
        status,
    }
}

/// Whether `name` is usable as a registry package name: `name` or
/// `@scope/name`, each segment made of URL-safe characters and not
/// starting with a dot. Such names are safe to join into filesystem paths.
pub fn is_valid_name(name: &str) -> bool {
    const MAX_LEN: usize = 214;

    if name.is_empty() || name.len() > MAX_LEN {
        return false;
    }

    let segment_ok = |segment: &str| {
        !segment.is_empty()
            && !segment.starts_with('.')
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    };

    match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, rest)) => segment_ok(scope) && segment_ok(rest),
            None => false,
        },
        None => segment_ok(name),
    }
}

pub fn encode_package_name(name: &str) -> String {
    if name.starts_with('@') {
        name.replace('/', "%2F")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_bodies_are_registry_rejections() {
        let err = classify_failure(
            "https://r/x/-/x-1.0.0.tgz",
            404,
            Some("application/json; charset=utf-8"),
            r#"{"error":"not_found"}"#,
        );
        match err {
            IppmError::RegistryRejected { url, message } => {
                assert_eq!(url, "https://r/x/-/x-1.0.0.tgz");
                assert_eq!(message, "not_found");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn other_bodies_are_transport_failures() {
        let err = classify_failure("https://r/x.tgz", 502, Some("text/html"), "<html>");
        assert!(matches!(err, IppmError::HttpStatus { status: 502, .. }));
        assert!(err.is_transient());

        let err = classify_failure("https://r/x.tgz", 500, Some("application/json"), "{oops");
        assert!(matches!(err, IppmError::HttpStatus { status: 500, .. }));
    }

    #[test]
    fn scoped_names_are_escaped() {
        let registry = HttpRegistry::with_client(Client::new(), "https://registry.example/");
        assert_eq!(
            registry.package_url("@types/node"),
            "https://registry.example/@types%2Fnode"
        );
        assert_eq!(
            registry.package_url("left-pad"),
            "https://registry.example/left-pad"
        );
    }

    #[test]
    fn names_that_escape_a_directory_are_invalid() {
        for name in ["left-pad", "@types/node", "lodash.merge", "Foo_bar~2"] {
            assert!(is_valid_name(name), "{} should be valid", name);
        }
        for name in [
            "",
            "..",
            ".hidden",
            "../../../../escaped",
            "a/../../b",
            "a/b",
            "@scope",
            "@scope/a/b",
            "@scope/..",
            "@../x",
            "/abs",
            "a\\b",
            "a b",
        ] {
            assert!(!is_valid_name(name), "{:?} should be invalid", name);
        }
    }
}
