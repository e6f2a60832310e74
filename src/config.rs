use anyhow::{Context, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::download::DispatchMode;
use crate::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Mirrors of the indexing site, most preferred first
    #[serde(default = "default_proxies")]
    pub proxies: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_solve_challenges")]
    pub solve_challenges: bool,
    #[serde(default = "default_challenge_wait_secs")]
    pub challenge_wait_secs: u64,
    /// How long a failed mirror stays demoted
    #[serde(default = "default_failure_penalty_secs")]
    pub failure_penalty_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub mode: DispatchMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

// Default value functions
fn default_proxies() -> Vec<String> {
    vec![
        "https://1337x.to".to_string(),
        "https://x1337x.se".to_string(),
        "https://x1337x.ws".to_string(),
        "https://x1337x.eu".to_string(),
    ]
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0".to_string()
}
fn default_solve_challenges() -> bool {
    true
}
fn default_challenge_wait_secs() -> u64 {
    5
}
fn default_failure_penalty_secs() -> u64 {
    300
}
fn default_cache_enabled() -> bool {
    true
}
fn default_cache_ttl_secs() -> u64 {
    300
}
fn default_limit() -> usize {
    20
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            proxies: default_proxies(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            solve_challenges: default_solve_challenges(),
            challenge_wait_secs: default_challenge_wait_secs(),
            failure_penalty_secs: default_failure_penalty_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            directory: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
        }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn challenge_wait(&self) -> Duration {
        Duration::from_secs(self.challenge_wait_secs)
    }

    pub fn failure_penalty(&self) -> Duration {
        Duration::from_secs(self.failure_penalty_secs)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Config {
    /// Check the values a run cannot work without.
    pub fn validate(&self) -> crate::Result<()> {
        if self.network.proxies.iter().all(|p| p.trim().is_empty()) {
            return Err(Error::Config(
                "network.proxies must list at least one mirror".to_string(),
            ));
        }
        if self.network.timeout_secs == 0 {
            return Err(Error::Config(
                "network.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::Config(
                "cache.ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.display.default_limit == 0 || self.display.default_limit > 100 {
            return Err(Error::Config(
                "display.default_limit must be between 1 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct ConfigManager {
    config_file: PathBuf,
    cache_dir: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config from the platform config directory, writing defaults on first run
    pub fn new() -> Result<Self> {
        let project_dirs = Self::project_dirs()?;
        let config_file = project_dirs.config_dir().join("config.toml");
        Self::load_or_create(config_file, project_dirs.cache_dir().join("responses"))
    }

    /// Load the config from an explicit file instead of the platform default
    pub fn from_file(config_file: &Path) -> Result<Self> {
        let cache_dir = Self::project_dirs()
            .map(|dirs| dirs.cache_dir().join("responses"))
            .unwrap_or_else(|_| PathBuf::from(".torrent-cli-cache"));
        Self::load_or_create(config_file.to_path_buf(), cache_dir)
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("", "", "torrent-cli").context("Failed to determine config directory")
    }

    fn load_or_create(config_file: PathBuf, cache_dir: PathBuf) -> Result<Self> {
        if let Some(config_dir) = config_file.parent() {
            if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
                fs::create_dir_all(config_dir).with_context(|| {
                    format!("Failed to create config directory: {:?}", config_dir)
                })?;
            }
        }

        let config = if config_file.exists() {
            Self::load_config(&config_file)?
        } else {
            let default_config = Config::default();
            Self::save_config(&config_file, &default_config)?;
            default_config
        };

        Ok(Self {
            config_file,
            cache_dir,
            config,
        })
    }

    /// Get a reference to the current config
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the config file path
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    /// Directory holding cached responses, honoring `cache.directory`
    pub fn cache_dir(&self) -> PathBuf {
        self.config
            .cache
            .directory
            .clone()
            .unwrap_or_else(|| self.cache_dir.clone())
    }

    /// Directory downloads are dispatched into, honoring `download.directory`
    pub fn download_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config.download.directory {
            return dir.clone();
        }
        UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(|d| d.join("torrents")))
            .unwrap_or_else(|| PathBuf::from("downloads"))
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.config.validate()
    }

    fn load_config(config_file: &Path) -> Result<Config> {
        let content = fs::read_to_string(config_file)
            .with_context(|| format!("Failed to read config file: {:?}", config_file))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_file))?;

        Ok(config)
    }

    fn save_config(config_file: &Path, config: &Config) -> Result<()> {
        let content = toml::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(config_file, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_file))?;

        Ok(())
    }
}
