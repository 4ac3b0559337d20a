use anyhow::{Context, Result, anyhow};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

/// Environment variable that overrides the city for a run.
pub const CITY_ENV: &str = "WEATHER_CITY";
/// Environment variable that turns on diagnostic logging.
pub const DEBUG_ENV: &str = "WEATHER_DEBUG";

const CACHE_FILE_NAME: &str = ".weather_cache.json";

/// Base URLs for every upstream service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub ipapi_co: String,
    pub ip_api_com: String,
    pub geocoding: String,
    pub forecast: String,
    pub wttr: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            ipapi_co: "https://ipapi.co".to_string(),
            ip_api_com: "http://ip-api.com".to_string(),
            geocoding: "https://geocoding-api.open-meteo.com".to_string(),
            forecast: "https://api.open-meteo.com".to_string(),
            wttr: "https://wttr.in".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every service at one base URL (used against mock servers).
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            ipapi_co: format!("{base}/ipapi"),
            ip_api_com: format!("{base}/ip-api"),
            geocoding: base.clone(),
            forecast: base.clone(),
            wttr: format!("{base}/wttr"),
        }
    }
}

/// Runtime settings, optionally read from `config.toml`.
///
/// Example TOML:
/// ```toml
/// cache_ttl_secs = 900
/// preferred_country = "CA"
///
/// [endpoints]
/// wttr = "https://wttr.in"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache location; `None` means `~/.weather_cache.json`.
    pub cache_file: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub location_timeout_ms: u64,
    /// Extra time the whole location race may take past one call's timeout.
    pub location_race_grace_ms: u64,
    pub weather_timeout_ms: u64,
    pub geocode_results: u8,
    pub preferred_country: String,
    pub user_agent: String,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: None,
            cache_ttl_secs: 1800,
            location_timeout_ms: 2000,
            location_race_grace_ms: 500,
            weather_timeout_ms: 2000,
            geocode_results: 5,
            preferred_country: "US".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    pub fn location_timeout(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms)
    }

    pub fn location_race_deadline(&self) -> Duration {
        Duration::from_millis(self.location_timeout_ms + self.location_race_grace_ms)
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_millis(self.weather_timeout_ms)
    }

    /// Resolved cache path.
    pub fn cache_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.cache_file {
            return Ok(path.clone());
        }

        let dirs = BaseDirs::new().ok_or_else(|| anyhow!("Could not determine home directory"))?;
        Ok(dirs.home_dir().join(CACHE_FILE_NAME))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config TOML")
    }

    /// Load config from the default location, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Load config from an explicit path; a missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "nowcast", "nowcast")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// City override from the environment, ignoring blank values.
pub fn city_from_env() -> Option<String> {
    std::env::var(CITY_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Whether diagnostic logging was requested through the environment.
pub fn debug_from_env() -> bool {
    std::env::var_os(DEBUG_ENV).is_some_and(|v| !v.is_empty())
}
