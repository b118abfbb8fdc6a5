// Configuration management for persistent settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fs;
use std::path::PathBuf;

#[cfg(debug_assertions)]
const APP_NAME: &str = "deskbridge-dev";

#[cfg(not(debug_assertions))]
const APP_NAME: &str = "deskbridge";

/// Forces a generic feed at this URL, e.g. the local `update-server`.
pub const UPDATE_URL_ENV: &str = "DESKBRIDGE_UPDATE_URL";

const DEFAULT_CHANNEL: &str = "latest";

/// Bridge settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct BridgeSettings {
    #[serde(default)]
    pub updates: UpdateSettings,
}

/// Auto-update settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateSettings {
    #[serde(default)]
    pub provider: UpdateProvider,
    #[serde(default)]
    pub allow_nightly: bool,
    /// Regex matched against release asset names (GitHub only)
    #[serde(default)]
    pub asset_pattern: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Where updates are published
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UpdateProvider {
    #[default]
    None,
    GitHub {
        owner: String,
        repo: String,
    },
    Generic {
        url: String,
        #[serde(default = "default_channel")]
        channel: String,
    },
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

impl UpdateSettings {
    /// Configured provider, unless [`UPDATE_URL_ENV`] overrides it.
    pub fn effective_provider(&self) -> UpdateProvider {
        self.provider_with_override(std::env::var(UPDATE_URL_ENV).ok().as_deref())
    }

    fn provider_with_override(&self, override_url: Option<&str>) -> UpdateProvider {
        match override_url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => {
                log::info!("Using update feed override {url}");
                UpdateProvider::Generic { url: url.to_string(), channel: default_channel() }
            }
            None => self.provider.clone(),
        }
    }
}

/// Manages persistent configuration files
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    const SETTINGS_FILE: &'static str = "settings.json";

    /// Create a new ConfigManager, initializing the config directory if needed
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;

        // Ensure config directory exists
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        }

        Ok(Self { config_dir })
    }

    /// Use an explicit directory instead of the platform default
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self { config_dir: config_dir.into() }
    }

    /// Get the platform-specific config directory
    fn get_config_dir() -> Result<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_NAME)).context("Could not determine config directory")
    }

    /// Get path to a specific config file
    fn file_path(&self, filename: &str) -> PathBuf {
        self.config_dir.join(filename)
    }

    /// Load data from a JSON file
    fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<Option<T>> {
        let path = self.file_path(filename);

        if !path.exists() {
            return Ok(None);
        }

        let data =
            fs::read_to_string(&path).with_context(|| format!("Failed to read {}", filename))?;

        let value: T = serde_json::from_str(&data)
            .with_context(|| format!("Failed to deserialize {}", filename))?;

        Ok(Some(value))
    }

    /// Save data to a JSON file (atomic via temp + rename).
    fn save_json<T: Serialize + ?Sized>(&self, filename: &str, data: &T) -> Result<()> {
        let path = self.file_path(filename);

        let json = serde_json::to_string_pretty(data)
            .with_context(|| format!("Failed to serialize {}", filename))?;

        atomic_write(&path, json.as_bytes())
            .with_context(|| format!("Failed to write {}", filename))?;

        Ok(())
    }

    /// Load bridge settings, falling back to defaults when none are saved
    pub fn load_settings(&self) -> Result<BridgeSettings> {
        Ok(self.load_json(Self::SETTINGS_FILE)?.unwrap_or_default())
    }

    /// Save bridge settings to disk
    pub fn save_settings(&self, settings: &BridgeSettings) -> Result<()> {
        self.save_json(Self::SETTINGS_FILE, settings)
    }
}

/// Write `data` to `path` atomically: write to a sibling temp file first, then
/// rename. Readers see either the old content or the new content.
fn atomic_write(path: &std::path::Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(path);
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
