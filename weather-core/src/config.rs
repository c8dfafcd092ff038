use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::worker::CacheGeneration;

pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com/v1";
const DATA_DIR_ENV: &str = "WEATHER_DATA_DIR";

/// Credentials and endpoint for the WeatherAPI.com provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The app shell the cache worker precaches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Origin the shell is served from; precache paths resolve against it.
    pub origin: String,
    pub cache_prefix: String,
    /// Bump whenever `precache` changes.
    pub cache_version: u32,
    pub precache: Vec<String>,
    pub offline_page: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000/".to_string(),
            cache_prefix: "weather-app".to_string(),
            cache_version: 6,
            precache: vec!["index.html".to_string(), "offline.html".to_string()],
            offline_page: "offline.html".to_string(),
        }
    }
}

impl ShellConfig {
    pub fn generation(&self) -> CacheGeneration {
        CacheGeneration::new(&self.cache_prefix, self.cache_version, self.precache.clone())
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [weatherapi]
/// api_key = "..."
///
/// [shell]
/// cache_version = 6
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub weatherapi: ProviderConfig,
    pub shell: ShellConfig,
}

impl Config {
    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory holding persisted searches, the offline queue and the
    /// cache snapshot. `WEATHER_DATA_DIR` overrides the platform default.
    pub fn data_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.weatherapi.api_key = Some(api_key);
    }

    /// Returns the API key, or a hint on how to configure one.
    pub fn api_key(&self) -> Result<&str> {
        self.weatherapi
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key configured for WeatherAPI.\n\
                     Hint: run `weather configure` and enter your API key."
                )
            })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_ok()
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "weather-task", "weather-cli")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}
