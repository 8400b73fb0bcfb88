use directories::BaseDirs;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod file;
pub use self::file::*;

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";
pub const DEFAULT_FEED_URL: &str = "https://replicate.npmjs.com/registry";
pub const DEFAULT_STORE_API: &str = "http://127.0.0.1:5001";
pub const DEFAULT_STORE_ROOT: &str = "/ipfs";

#[derive(Debug, Clone)]
pub struct IppmConfig {
    pub home_dir: PathBuf,
    pub registry: String,
    pub feed_url: String,
    pub store_api: String,
    pub store_root: PathBuf,
    pub mirror_dir: PathBuf,
    pub batch_size: usize,
    pub max_retries: u32,
    pub feed_retries: u32,
    pub fetch_attempts: u32,
    pub retry_delay_ms: u64,
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

impl IppmConfig {
    pub fn from_env() -> Self {
        let home_dir = env::var("IPPM_HOME")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_home);

        let mut config = IppmConfig::with_home(home_dir);

        match ConfigFile::load(&config.home_dir.join("config")) {
            Ok(Some(file)) => config.apply_file(file),
            Ok(None) => {}
            Err(err) => crate::console::warn(&format!("ignoring config file: {}", err)),
        }

        config.apply_env(|key| env::var(key).ok());
        config
    }

    pub fn with_home(home_dir: PathBuf) -> Self {
        IppmConfig {
            home_dir,
            registry: DEFAULT_REGISTRY.to_string(),
            feed_url: DEFAULT_FEED_URL.to_string(),
            store_api: DEFAULT_STORE_API.to_string(),
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            mirror_dir: PathBuf::from("./ws"),
            batch_size: 10,
            max_retries: 10,
            feed_retries: 10,
            fetch_attempts: 3,
            retry_delay_ms: 10_000,
            verbose: false,
            log_file: None,
        }
    }

    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(value) = file.registry {
            self.registry = normalize_url(&value);
        }
        if let Some(value) = file.feed_url {
            self.feed_url = normalize_url(&value);
        }
        if let Some(value) = file.store_api {
            self.store_api = normalize_url(&value);
        }
        if let Some(value) = file.store_root {
            self.store_root = value;
        }
        if let Some(value) = file.mirror_dir {
            self.mirror_dir = value;
        }
        if let Some(value) = file.batch_size.filter(|v| *v > 0) {
            self.batch_size = value;
        }
        if let Some(value) = file.max_retries {
            self.max_retries = value;
        }
        if let Some(value) = file.feed_retries {
            self.feed_retries = value;
        }
        if let Some(value) = file.fetch_attempts.filter(|v| *v > 0) {
            self.fetch_attempts = value;
        }
        if let Some(value) = file.retry_delay_ms {
            self.retry_delay_ms = value;
        }
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |keys: &[&str]| {
            keys.iter()
                .filter_map(|key| lookup(key))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        if let Some(value) = read(&["IPPM_REGISTRY", "NPM_CONFIG_REGISTRY", "npm_config_registry"]) {
            self.registry = normalize_url(&value);
        }
        if let Some(value) = read(&["IPPM_FEED_URL"]) {
            self.feed_url = normalize_url(&value);
        }
        if let Some(value) = read(&["IPPM_STORE_API"]) {
            self.store_api = normalize_url(&value);
        }
        if let Some(value) = read(&["IPPM_STORE_ROOT"]) {
            self.store_root = PathBuf::from(value);
        }
        if let Some(value) = read(&["IPPM_MIRROR_DIR"]) {
            self.mirror_dir = PathBuf::from(value);
        }
        if let Some(parsed) = read(&["IPPM_BATCH_SIZE"]).and_then(|v| v.parse::<usize>().ok())
            && parsed > 0
        {
            self.batch_size = parsed;
        }
        if let Some(parsed) = read(&["IPPM_MAX_RETRIES"]).and_then(|v| v.parse::<u32>().ok()) {
            self.max_retries = parsed;
        }
        if let Some(parsed) = read(&["IPPM_FEED_RETRIES"]).and_then(|v| v.parse::<u32>().ok()) {
            self.feed_retries = parsed;
        }
        if let Some(parsed) = read(&["IPPM_FETCH_ATTEMPTS"]).and_then(|v| v.parse::<u32>().ok())
            && parsed > 0
        {
            self.fetch_attempts = parsed;
        }
        if let Some(parsed) = read(&["IPPM_RETRY_DELAY_MS"]).and_then(|v| v.parse::<u64>().ok()) {
            self.retry_delay_ms = parsed;
        }
        if let Some(value) = read(&["IPPM_VERBOSE"]) {
            let v = value.to_ascii_lowercase();
            self.verbose = matches!(v.as_str(), "1" | "true" | "yes" | "y" | "on");
        }
        if let Some(value) = read(&["IPPM_LOG_FILE"]) {
            self.log_file = Some(PathBuf::from(value));
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home_dir.join("cache")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.mirror_dir.join("repo")
    }

    pub fn state_path(&self) -> PathBuf {
        self.mirror_dir.join("state.json")
    }

    pub fn legacy_seq_path(&self) -> PathBuf {
        self.mirror_dir.join("seq")
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.mirror_dir.join("errorlog")
    }

    pub fn add_log_path(&self) -> PathBuf {
        self.mirror_dir.join("addlog")
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Location a package identity is materialized at for a given content
    /// address: `<store_root>/<address>/<identity>`.
    pub fn materialized_path(&self, address: &str, identity: &str) -> PathBuf {
        materialized_path(&self.store_root, address, identity)
    }
}

pub fn materialized_path(store_root: &Path, address: &str, identity: &str) -> PathBuf {
    store_root.join(address).join(identity)
}

fn default_home() -> PathBuf {
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(".ippm"),
        None => PathBuf::from(".ippm"),
    }
}
