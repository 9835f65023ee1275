use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_REPO_PATH: &str = "meta";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60 * 60;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;
const DEFAULT_COMPANION_BIN: &str = "anni";
const DEFAULT_PREBUILT_PATH: &str = "prebuilt";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub version: u32,
    /// Checkout of the metadata repository, relative to the config file.
    pub repo_path: String,
    /// Remote to clone and pull from. Blank serves `repo_path` as is.
    pub repo_url: String,
    pub sync_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub companion_enabled: bool,
    pub companion_bin: String,
    pub prebuilt_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            repo_path: DEFAULT_REPO_PATH.to_string(),
            repo_url: String::new(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            companion_enabled: true,
            companion_bin: DEFAULT_COMPANION_BIN.to_string(),
            prebuilt_path: DEFAULT_PREBUILT_PATH.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn normalize(&mut self) {
        if self.version < CONFIG_VERSION {
            self.version = CONFIG_VERSION;
        }
        if self.repo_path.trim().is_empty() {
            self.repo_path = DEFAULT_REPO_PATH.to_string();
        }
        self.repo_url = self.repo_url.trim().to_string();
        if self.sync_interval_secs == 0 {
            self.sync_interval_secs = DEFAULT_SYNC_INTERVAL_SECS;
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = DEFAULT_FETCH_TIMEOUT_SECS;
        }
        if self.companion_bin.trim().is_empty() {
            self.companion_bin = DEFAULT_COMPANION_BIN.to_string();
        }
        if self.prebuilt_path.trim().is_empty() {
            self.prebuilt_path = DEFAULT_PREBUILT_PATH.to_string();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("META_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Reads the config at `path`, writing the defaults there first if it is missing.
/// The flag is true when the file was created.
pub fn load_or_create_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: ServerConfig = if contents.trim().is_empty() {
            ServerConfig::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.normalize();
        return Ok((config, false));
    }

    let config = ServerConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}
