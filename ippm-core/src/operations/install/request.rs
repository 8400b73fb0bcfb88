use crate::registry;
use crate::{IppmError, Result};
use ippm_semver::RangeSet;

pub const DEFAULT_TAG: &str = "latest";

#[derive(Clone, Debug)]
pub enum VersionRequest {
    Version(String),
    Range(RangeSet),
    Tag(String),
}

/// A package argument such as `left-pad`, `left-pad@1.0.0`,
/// `left-pad@^1.0.0` or `left-pad@next`.
#[derive(Clone, Debug)]
pub struct PackageRequest {
    pub name: String,
    pub spec: String,
    pub version: VersionRequest,
}

impl PackageRequest {
    pub fn parse(raw: &str) -> Result<Self> {
        let unsupported = |reason: &str| IppmError::UnsupportedSpec {
            spec: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let (name, spec) = split_spec(trimmed);

        if spec.contains(':') || name.contains(':') {
            return Err(unsupported("only registry packages can be installed"));
        }

        if name.is_empty() {
            return Err(unsupported("missing package name"));
        }

        if name.starts_with('.') || name.starts_with('/') || name.starts_with('~') {
            return Err(unsupported("local paths are not supported"));
        }

        let slashes = name.matches('/').count();
        if (name.starts_with('@') && slashes != 1) || (!name.starts_with('@') && slashes > 0) {
            return Err(unsupported("not a registry package name"));
        }

        if !registry::is_valid_name(name) {
            return Err(unsupported("not a registry package name"));
        }

        let spec = spec.trim();
        let version = if spec.is_empty() || spec == DEFAULT_TAG {
            VersionRequest::Tag(DEFAULT_TAG.to_string())
        } else if let Some(exact) = ippm_semver::clean(spec).filter(|_| !spec.contains(' ')) {
            VersionRequest::Version(exact)
        } else if let Ok(range) = RangeSet::parse(spec) {
            VersionRequest::Range(range)
        } else if is_tag_name(spec) {
            VersionRequest::Tag(spec.to_string())
        } else {
            return Err(unsupported("invalid version, range or tag"));
        };

        Ok(PackageRequest {
            name: name.to_string(),
            spec: spec.to_string(),
            version,
        })
    }

    /// The range to record in `ippm.json` for a package resolved to
    /// `resolved`.
    pub fn saved_range(&self, resolved: &str) -> String {
        match &self.version {
            VersionRequest::Range(range) => range.original().to_string(),
            VersionRequest::Version(_) | VersionRequest::Tag(_) => format!("^{}", resolved),
        }
    }
}

impl std::fmt::Display for PackageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.spec.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.spec)
        }
    }
}

/// Splits at the last `@` that is not the scope marker.
fn split_spec(raw: &str) -> (&str, &str) {
    let search_from = usize::from(raw.starts_with('@'));

    match raw[search_from..].rfind('@') {
        Some(index) => {
            let at = search_from + index;
            (&raw[..at], &raw[at + 1..])
        }
        None => (raw, ""),
    }
}

fn is_tag_name(spec: &str) -> bool {
    spec.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
