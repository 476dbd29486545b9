//! Configuration management for WasherCheck
//!
//! Handles environment variables and application settings.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{Display, EnumString};
use tracing::{info, warn};

use crate::services::time_provider::duration_from_secs;

/// Where machine readings come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum MachineSource {
    /// eSuds HTML status page
    Esuds,
    /// JSON status API
    StatusApi,
    /// Status API first, eSuds page when it fails
    Fallback,
    /// Random readings
    Random,
    /// Readings that cycle through every status
    Descending,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Database URL
    pub database_url: String,

    /// Environment (development, production)
    pub environment: String,

    /// Log level
    pub log_level: String,

    /// CORS origins (empty means allow all)
    pub cors_origins: Vec<String>,

    /// Outbound request timeout in seconds
    pub request_timeout: u64,

    /// Machine status provider
    pub machine_source: MachineSource,

    /// eSuds room status page
    pub esuds_base_url: String,

    /// JSON status API root
    pub status_api_base_url: String,

    /// Room refreshed when a refresh names no rooms
    pub default_room_id: i64,

    /// Location tree JSON; the built-in tree is used when unset
    pub locations_file: Option<PathBuf>,

    /// Shortest wait between notification checks, in seconds
    pub min_check_interval: u64,

    /// Longest wait between notification checks, in seconds
    pub max_check_interval: u64,

    /// Age in seconds after which cached room readings are refetched
    pub cache_max_age: u64,

    /// Webhook receiving "machines ready" notifications; log only when unset
    pub webhook_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite:washercheck.db".to_string(),
            environment: "development".to_string(),
            log_level: "info".to_string(),
            cors_origins: vec![],
            request_timeout: 30,
            machine_source: MachineSource::Esuds,
            esuds_base_url: "http://esuds.net/RoomStatus/machineStatus.i".to_string(),
            status_api_base_url: "http://net-zdremann-wc.appspot.com".to_string(),
            default_room_id: 1434,
            locations_file: None,
            min_check_interval: 60,
            max_check_interval: 30 * 60,
            cache_max_age: 60,
            webhook_url: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup, defaults filling the gaps
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server configuration
        if let Some(host) = lookup("WASHERCHECK_HOST") {
            config.host = host;
        }

        if let Some(port) = lookup("WASHERCHECK_PORT") {
            config.port = port.parse().map_err(|_| ConfigError::InvalidPort(port))?;
        }

        // Database configuration
        if let Some(database_url) = lookup("WASHERCHECK_DATABASE_URL") {
            config.database_url = database_url;
        }

        // Environment
        if let Some(environment) = lookup("WASHERCHECK_ENVIRONMENT") {
            config.environment = environment;
        }

        // Logging
        if let Some(log_level) = lookup("WASHERCHECK_LOG_LEVEL") {
            config.log_level = log_level;
        }

        // CORS origins
        if let Some(cors_origins) = lookup("WASHERCHECK_CORS_ORIGINS") {
            config.cors_origins = cors_origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Machine status provider
        if let Some(timeout) = lookup("WASHERCHECK_REQUEST_TIMEOUT") {
            config.request_timeout = parse_secs(&timeout, ConfigError::InvalidRequestTimeout)?;
        }

        if let Some(source) = lookup("WASHERCHECK_MACHINE_SOURCE") {
            config.machine_source =
                MachineSource::from_str(&source).map_err(|_| ConfigError::InvalidMachineSource(source))?;
        }

        if let Some(url) = lookup("WASHERCHECK_ESUDS_URL") {
            config.esuds_base_url = url;
        }

        if let Some(url) = lookup("WASHERCHECK_STATUS_API_URL") {
            config.status_api_base_url = url;
        }

        if let Some(room_id) = lookup("WASHERCHECK_DEFAULT_ROOM") {
            config.default_room_id = room_id.parse().map_err(|_| ConfigError::InvalidRoomId(room_id))?;
        }

        if let Some(path) = lookup("WASHERCHECK_LOCATIONS_FILE") {
            config.locations_file = Some(PathBuf::from(path)).filter(|p| !p.as_os_str().is_empty());
        }

        // Notification checks
        if let Some(interval) = lookup("WASHERCHECK_MIN_CHECK_INTERVAL") {
            config.min_check_interval = parse_secs(&interval, ConfigError::InvalidCheckInterval)?;
        }

        if let Some(interval) = lookup("WASHERCHECK_MAX_CHECK_INTERVAL") {
            config.max_check_interval = parse_secs(&interval, ConfigError::InvalidCheckInterval)?;
        }

        if let Some(max_age) = lookup("WASHERCHECK_CACHE_MAX_AGE") {
            config.cache_max_age = parse_secs(&max_age, ConfigError::InvalidCacheMaxAge)?;
        }

        if let Some(url) = lookup("WASHERCHECK_WEBHOOK_URL") {
            config.webhook_url = Some(url).filter(|u| !u.trim().is_empty());
        }

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }

        if self.database_url.is_empty() {
            return Err(ConfigError::EmptyDatabaseUrl);
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidRequestTimeout(self.request_timeout.to_string()));
        }

        for url in [&self.esuds_base_url, &self.status_api_base_url] {
            url::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }
        if let Some(url) = &self.webhook_url {
            url::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }

        if self.min_check_interval == 0 {
            return Err(ConfigError::InvalidCheckInterval(self.min_check_interval.to_string()));
        }

        if duration_from_secs(self.cache_max_age).is_none() {
            return Err(ConfigError::InvalidCacheMaxAge(self.cache_max_age.to_string()));
        }

        if self.min_check_interval > self.max_check_interval {
            return Err(ConfigError::CheckIntervalsOutOfOrder {
                min: self.min_check_interval,
                max: self.max_check_interval,
            });
        }

        Ok(())
    }

    /// Get server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn request_timeout_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout)
    }

    pub fn cache_max_age_duration(&self) -> chrono::Duration {
        duration_from_secs(self.cache_max_age).unwrap_or(chrono::Duration::MAX)
    }

    /// Log configuration (excluding sensitive data)
    pub fn log_config(&self) {
        info!("Configuration loaded:");
        info!("  Environment: {}", self.environment);
        info!("  Bind address: {}", self.bind_address());
        info!("  Database URL: {}", self.mask_database_url());
        info!("  Log level: {}", self.log_level);
        info!("  CORS origins: {:?}", self.cors_origins);
        info!("  Machine source: {}", self.machine_source);
        info!("  eSuds URL: {}", self.esuds_base_url);
        info!("  Status API URL: {}", self.status_api_base_url);
        info!("  Default room: {}", self.default_room_id);
        info!("  Request timeout: {}s", self.request_timeout);
        info!(
            "  Check interval: {}s..{}s",
            self.min_check_interval, self.max_check_interval
        );
        info!("  Cache max age: {}s", self.cache_max_age);

        match &self.locations_file {
            Some(path) => info!("  Locations file: {:?}", path),
            None => info!("  Locations file: built-in"),
        }

        if self.webhook_url.is_none() {
            warn!("No webhook configured - ready notifications will only be logged");
        }
    }

    /// Mask database URL for logging
    fn mask_database_url(&self) -> String {
        if self.database_url.starts_with("sqlite:") {
            self.database_url.clone()
        } else if let Some((scheme, _)) = self.database_url.split_once("://") {
            format!("{scheme}://***")
        } else {
            "***".to_string()
        }
    }
}

fn parse_secs(value: &str, err: fn(String) -> ConfigError) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| err(value.to_string()))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid request timeout: {0}")]
    InvalidRequestTimeout(String),

    #[error("Invalid machine source: {0} (expected esuds, status-api, fallback, random or descending)")]
    InvalidMachineSource(String),

    #[error("Invalid room id: {0}")]
    InvalidRoomId(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid check interval: {0}")]
    InvalidCheckInterval(String),

    #[error("Minimum check interval {min}s exceeds maximum {max}s")]
    CheckIntervalsOutOfOrder { min: u64, max: u64 },

    #[error("Invalid cache max age: {0}")]
    InvalidCacheMaxAge(String),

    #[error("Empty database URL")]
    EmptyDatabaseUrl,
}
