use std::path::PathBuf;
use thiserror::Error;

/// Coarse failure classes that decide how a caller reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Integrity,
    TransientNetwork,
    MalformedUpstream,
    InvariantViolation,
    Local,
}

#[derive(Error, Debug)]
pub enum IppmError {
    #[error("Failed to read file {path:?}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to write file {path:?}: {source}")]
    WriteFile { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse JSON in {path:?}: {source}")]
    ParseJson { path: PathBuf, source: serde_json::Error },

    #[error("Failed to serialize JSON for {path:?}: {reason}")]
    SerializeJson { path: PathBuf, reason: String },

    #[error("Unable to find ippm.lock or ippm.json in {path:?} or any parent directory")]
    ProjectMissing { path: PathBuf },

    #[error("HTTP request to {url} failed: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("{message} \"{url}\"")]
    RegistryRejected { url: String, message: String },

    #[error("HTTP status {status} \"{url}\"")]
    HttpStatus { url: String, status: u16 },

    #[error("Invalid registry data for \"{name}\": {reason}")]
    MalformedUpstream { name: String, reason: String },

    #[error("{algorithm} mismatch \"{url}\" (expected {expected}, got {actual})")]
    Integrity {
        url: String,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Failed to unpack archive from {url}: {source}")]
    Archive { url: String, source: std::io::Error },

    #[error("Unsupported package argument \"{spec}\": {reason}")]
    UnsupportedSpec { spec: String, reason: String },

    #[error("Could not find a satisfying version for package \"{spec}\"")]
    NoMatchingVersion { spec: String },

    #[error("Could not find tag \"{tag}\" for package \"{name}\"")]
    TagNotFound { name: String, tag: String },

    #[error("Invalid version range {value}: {source}")]
    Semver {
        value: String,
        source: ippm_semver::Error,
    },

    #[error("Package {requester:?} does not depend on \"{name}\"")]
    DependencyNotFound { requester: String, name: String },

    #[error("Corrupt lock: {identity:?} depends on {dependency:?}, which has no record")]
    CorruptLock { identity: String, dependency: String },

    #[error("Lock record {identity:?} has no content address")]
    MissingAddress { identity: String },

    #[error("Content store insert failed: {reason}")]
    StoreInsert { reason: String },

    #[error("Content store fetch of {address}/{path} failed: {reason}")]
    StoreFetch {
        address: String,
        path: String,
        reason: String,
    },

    #[error("Change feed unavailable after {attempts} attempts: {source}")]
    FeedExhausted {
        attempts: u32,
        source: Box<IppmError>,
    },
}

impl IppmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IppmError::ProjectMissing { .. }
            | IppmError::NoMatchingVersion { .. }
            | IppmError::TagNotFound { .. }
            | IppmError::DependencyNotFound { .. } => ErrorKind::NotFound,
            IppmError::Integrity { .. } => ErrorKind::Integrity,
            IppmError::Http { .. }
            | IppmError::HttpStatus { .. }
            | IppmError::StoreInsert { .. }
            | IppmError::StoreFetch { .. }
            | IppmError::FeedExhausted { .. } => ErrorKind::TransientNetwork,
            IppmError::RegistryRejected { .. }
            | IppmError::MalformedUpstream { .. }
            | IppmError::Archive { .. } => ErrorKind::MalformedUpstream,
            IppmError::CorruptLock { .. } | IppmError::MissingAddress { .. } => {
                ErrorKind::InvariantViolation
            }
            IppmError::ReadFile { .. }
            | IppmError::WriteFile { .. }
            | IppmError::ParseJson { .. }
            | IppmError::SerializeJson { .. }
            | IppmError::UnsupportedSpec { .. }
            | IppmError::Semver { .. } => ErrorKind::Local,
        }
    }

    /// Retrying will not change the outcome.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::MalformedUpstream | ErrorKind::NotFound
        )
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientNetwork
    }
}
