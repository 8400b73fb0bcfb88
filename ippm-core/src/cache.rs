use crate::console;
use crate::persist::{read_json, write_json_atomic};
use crate::Result;
use futures::lock::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

type VersionAddresses = BTreeMap<String, String>;

/// Durable `(name, version) -> content address` cache, one JSON file per
/// package name under `<home>/cache`.
#[derive(Debug)]
pub struct AddressCache {
    dir: PathBuf,
    loaded: Mutex<HashMap<String, VersionAddresses>>,
}

impl AddressCache {
    pub fn new(dir: &Path) -> Self {
        AddressCache {
            dir: dir.to_path_buf(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, name: &str, version: &str) -> Result<Option<String>> {
        let mut loaded = self.loaded.lock().await;
        let entries = self.entries(&mut loaded, name)?;
        Ok(entries.get(version).cloned())
    }

    /// Records an address; an existing entry for the version is kept.
    pub async fn put(&self, name: &str, version: &str, address: &str) -> Result<()> {
        let mut loaded = self.loaded.lock().await;
        let path = self.path_for(name);
        let entries = self.entries(&mut loaded, name)?;

        if entries.contains_key(version) {
            return Ok(());
        }

        entries.insert(version.to_string(), address.to_string());
        write_json_atomic(&path, entries)?;

        if console::is_logging_enabled() {
            console::verbose(&format!(
                "cached address for {}@{}: {} ({})",
                name,
                version,
                address,
                path.display()
            ));
        }

        Ok(())
    }

    fn entries<'a>(
        &self,
        loaded: &'a mut HashMap<String, VersionAddresses>,
        name: &str,
    ) -> Result<&'a mut VersionAddresses> {
        if !loaded.contains_key(name) {
            let from_disk = read_json(&self.path_for(name))?.unwrap_or_default();
            loaded.insert(name.to_string(), from_disk);
        }

        Ok(loaded.entry(name.to_string()).or_default())
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_package_name(name)))
    }
}

fn sanitize_package_name(name: &str) -> String {
    name.replace('/', "__")
}
