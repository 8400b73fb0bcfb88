use crate::lockfile;
use crate::{Project, Result, console};

/// Drops unreachable records from the project lock and rewrites it.
/// Returns the removed identities.
pub fn gc(project: &Project) -> Result<Vec<String>> {
    let lock_path = project.lock_path();
    let lock = lockfile::read_or_default(&lock_path)?;
    let collected = lockfile::gc(&lock);

    let removed: Vec<String> = lock
        .packages
        .keys()
        .filter(|identity| !collected.packages.contains_key(*identity))
        .cloned()
        .collect();

    console::verbose(&format!(
        "gc: {} of {} records unreachable",
        removed.len(),
        lock.len()
    ));

    if !removed.is_empty() {
        lockfile::write(&lock_path, &collected)?;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::{LOCK_FILENAME, Lock, PackageId, PackageRecord};
    use tempfile::tempdir;

    #[test]
    fn removes_orphans_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LOCK_FILENAME);
        let mut lock = Lock::new();
        lock.insert(&PackageId::new("a", "1.0.0"), PackageRecord::new(None, "QmA"));
        lock.insert(&PackageId::new("old", "0.1.0"), PackageRecord::new(None, "QmO"));
        lock.root_mut()
            .dependencies
            .insert("a".into(), "1.0.0".into());
        lockfile::write(&path, &lock).unwrap();

        let project = Project::discover(dir.path()).unwrap();
        assert_eq!(gc(&project).unwrap(), vec!["old@0.1.0".to_string()]);
        assert!(gc(&project).unwrap().is_empty());

        let on_disk = lockfile::read(&path).unwrap();
        assert_eq!(on_disk.len(), 2);
        assert!(on_disk.get("a@1.0.0").is_some());
    }
}
