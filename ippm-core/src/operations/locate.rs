use crate::resolve::{Resolution, Resolver};
use crate::{IppmConfig, Project, Result};
use std::path::Path;

/// Resolves `specifier` as imported from `requesting_file` against the
/// project lock.
pub fn locate(
    config: &IppmConfig,
    project: &Project,
    specifier: &str,
    requesting_file: &Path,
) -> Result<Resolution> {
    let mut resolver = Resolver::load(&project.root, &config.store_root)?;
    resolver.resolve(specifier, requesting_file)
}
