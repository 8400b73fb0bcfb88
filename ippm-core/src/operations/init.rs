use crate::project::{MANIFEST_FILENAME, Manifest, Project};
use crate::{Result, console};
use std::collections::BTreeMap;
use std::path::Path;

/// Creates an `ippm.json` in `root` unless one already exists.
pub fn init(root: &Path) -> Result<Project> {
    let project = Project::open(root)?;

    if project.manifest_path.is_file() {
        return Ok(project);
    }

    let name = root
        .file_name()
        .and_then(|os| os.to_str())
        .unwrap_or("ippm-project")
        .to_string();

    let manifest = Manifest {
        name: Some(name),
        version: Some("0.1.0".to_string()),
        dependencies: BTreeMap::new(),
        ..Manifest::default()
    };

    project.write_manifest(&manifest)?;
    console::info(&format!("Created {}", MANIFEST_FILENAME));

    Project::open(root)
}
