use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::core::index::DEFAULT_CELL_SIZE_DEG;
use crate::core::registry::DEFAULT_CHANNEL_CAPACITY;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub directory: DirectorySettings,
    #[serde(default)]
    pub subscriptions: SubscriptionSettings,
    #[serde(default)]
    pub search: SearchSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3333 }

#[derive(Debug, Clone, Deserialize)]
pub struct DirectorySettings {
    /// Grid cell size of the spatial index, in degrees
    #[serde(default = "default_cell_size_deg")]
    pub cell_size_deg: f64,
    /// Records older than this are expired; `None` keeps them forever
    pub record_ttl_secs: Option<u64>,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            cell_size_deg: default_cell_size_deg(),
            record_ttl_secs: None,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_cell_size_deg() -> f64 { DEFAULT_CELL_SIZE_DEG }
fn default_sweep_interval_secs() -> u64 { 60 }

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSettings {
    /// Pushes buffered per subscriber before further pushes are dropped
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Subscriptions not refreshed within this window are reaped
    pub idle_timeout_secs: Option<u64>,
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            idle_timeout_secs: None,
        }
    }
}

fn default_channel_capacity() -> usize { DEFAULT_CHANNEL_CAPACITY }

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,
    #[serde(default = "default_max_radius_km")]
    pub max_radius_km: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_radius_km: default_radius_km(),
            max_radius_km: default_max_radius_km(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_radius_km() -> f64 { 10.0 }
fn default_max_radius_km() -> f64 { 100.0 }
fn default_limit() -> usize { 100 }
fn default_max_limit() -> usize { 1000 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl DirectorySettings {
    pub fn record_ttl(&self) -> Option<Duration> {
        self.record_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl SubscriptionSettings {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Local overrides (config/local.toml)
    /// 4. Environment variables (prefixed with DEVRADAR_)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., DEVRADAR__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("DEVRADAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings = apply_platform_overrides(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("DEVRADAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the directory cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cell = self.directory.cell_size_deg;
        if !cell.is_finite() || cell <= 0.0 || cell > 90.0 {
            return Err(ConfigError::Message(format!(
                "directory.cell_size_deg must be in (0, 90], got {}",
                cell
            )));
        }
        if self.subscriptions.channel_capacity == 0 {
            return Err(ConfigError::Message(
                "subscriptions.channel_capacity must be at least 1".to_string(),
            ));
        }
        let search = &self.search;
        if !(search.default_radius_km > 0.0 && search.default_radius_km <= search.max_radius_km) {
            return Err(ConfigError::Message(format!(
                "search.default_radius_km ({}) must be positive and not above max_radius_km ({})",
                search.default_radius_km, search.max_radius_km
            )));
        }
        if search.default_limit == 0 || search.default_limit > search.max_limit {
            return Err(ConfigError::Message(format!(
                "search.default_limit ({}) must be in 1..=max_limit ({})",
                search.default_limit, search.max_limit
            )));
        }
        Ok(())
    }
}

/// Honour the plain `PORT` variable set by most hosting platforms
fn apply_platform_overrides(settings: Config) -> Result<Config, ConfigError> {
    match std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
        Some(port) => Config::builder()
            .add_source(settings)
            .set_override("server.port", port as i64)?
            .build(),
        None => Ok(settings),
    }
}
