use crate::lockfile::{self, ROOT_IDENTITY};
use crate::{IppmError, Project, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPackage {
    pub identity: String,
    pub address: Option<String>,
    pub dependencies: Vec<(String, String)>,
}

impl ListedPackage {
    pub fn is_root(&self) -> bool {
        self.identity == ROOT_IDENTITY
    }
}

/// Every record of the project lock, root first, then by identity.
pub fn list(project: &Project) -> Result<Vec<ListedPackage>> {
    let lock_path = project.lock_path();
    if !lock_path.is_file() {
        return Err(IppmError::ProjectMissing { path: lock_path });
    }

    let lock = lockfile::read(&lock_path)?;

    Ok(lock
        .packages
        .iter()
        .map(|(identity, record)| ListedPackage {
            identity: identity.clone(),
            address: record.address.clone(),
            dependencies: record
                .dependencies
                .iter()
                .map(|(name, version)| (name.clone(), version.clone()))
                .collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockfile::{Lock, PackageId, PackageRecord};
    use tempfile::tempdir;

    #[test]
    fn lists_root_first() {
        let dir = tempdir().unwrap();
        let mut lock = Lock::new();
        let mut a = PackageRecord::new(None, "QmA");
        a.dependencies.insert("b".into(), "2.0.0".into());
        lock.insert(&PackageId::new("a", "1.0.0"), a);
        lock.insert(&PackageId::new("b", "2.0.0"), PackageRecord::new(None, "QmB"));
        lock.root_mut()
            .dependencies
            .insert("a".into(), "1.0.0".into());
        lockfile::write(&dir.path().join(lockfile::LOCK_FILENAME), &lock).unwrap();

        let project = Project::discover(dir.path()).unwrap();
        let listed = list(&project).unwrap();

        assert_eq!(listed.len(), 3);
        assert!(listed[0].is_root());
        assert_eq!(listed[0].address, None);
        assert_eq!(listed[1].identity, "a@1.0.0");
        assert_eq!(
            listed[1].dependencies,
            vec![("b".to_string(), "2.0.0".to_string())]
        );
        assert_eq!(listed[2].address.as_deref(), Some("QmB"));
    }

    #[test]
    fn missing_lock_is_not_found() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("ippm.json"), "{}").unwrap();
        let project = Project::discover(dir.path()).unwrap();

        assert!(list(&project).unwrap_err().is_permanent());
    }
}
