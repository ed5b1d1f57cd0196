//! Application configuration management.
//!
//! Configuration is stored at `~/.config/kiaremote/config.json`. Every field
//! is optional on disk; environment variables override the file, and the
//! encryption secret may instead live in the OS keychain.
//!
//! The `Config` is built once at startup and handed to the components that
//! need it; nothing reads it from global state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::auth::Keychain;
use crate::cipher::Cipher;
use crate::commands::{DailyLimitDetector, StatusSignature, DEFAULT_DAILY_LIMIT_SIGNATURES};
use crate::error::{Error, Result};

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "kiaremote";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session store file name
const STORE_FILE: &str = "sessions.store";

/// Log directory name under the data directory
const LOG_DIR: &str = "logs";

pub const ENV_ENCRYPTION_KEY: &str = "KIAREMOTE_ENCRYPTION_KEY";
pub const ENV_STORE_PATH: &str = "KIAREMOTE_STORE_PATH";
pub const ENV_LOG_DIR: &str = "KIAREMOTE_LOG_DIR";

/// Commands allowed per window.
const DEFAULT_MAX_COMMANDS: u32 = 5;

/// Rate window length in seconds (one hour).
const DEFAULT_WINDOW_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_commands: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_commands: DEFAULT_MAX_COMMANDS,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs.min(i64::MAX as u64) as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Secret the store key is derived from; keychain is consulted when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
    pub store_path: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub rate_limit: RateLimitConfig,
    pub daily_limit_signatures: Vec<StatusSignature>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encryption_key: None,
            store_path: None,
            log_dir: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            rate_limit: RateLimitConfig::default(),
            daily_limit_signatures: DEFAULT_DAILY_LIMIT_SIGNATURES.to_vec(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Load from an explicit file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(?path, "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from environment variables, looked up through `var`
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var(ENV_ENCRYPTION_KEY).filter(|k| !k.is_empty()) {
            self.encryption_key = Some(key);
        }
        if let Some(path) = var(ENV_STORE_PATH).filter(|p| !p.is_empty()) {
            self.store_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = var(ENV_LOG_DIR).filter(|d| !d.is_empty()) {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".to_string()))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("Could not find data directory".to_string()))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn store_path(&self) -> Result<PathBuf> {
        match self.store_path {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join(STORE_FILE)),
        }
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        match self.log_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join(LOG_DIR)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn daily_limit_detector(&self) -> DailyLimitDetector {
        DailyLimitDetector::new(self.daily_limit_signatures.clone())
    }

    /// Build the store cipher from the configured secret, falling back to
    /// the OS keychain.
    pub fn cipher(&self) -> Result<Cipher> {
        if let Some(ref key) = self.encryption_key {
            return Cipher::from_secret(key);
        }
        match Keychain::secret()? {
            Some(secret) => Cipher::from_secret(&secret),
            None => Err(Error::Config(format!(
                "no encryption key configured: set {} or run `kiaremote set-key`",
                ENV_ENCRYPTION_KEY
            ))),
        }
    }
}
