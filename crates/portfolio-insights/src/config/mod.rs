use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::workflows::insights::evaluation::{ThresholdConfig, ThresholdConfigError};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub insights: InsightsConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            insights: InsightsConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Scheduling and threshold settings for the insight engine.
#[derive(Debug, Clone)]
pub struct InsightsConfig {
    /// Zero disables scheduled passes.
    pub pass_interval: Duration,
    pub snapshot_path: Option<PathBuf>,
    pub thresholds_path: Option<PathBuf>,
    pub thresholds: ThresholdConfig,
    /// Days archived insights are kept; zero keeps them forever.
    pub archive_retention_days: u32,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            pass_interval: Duration::from_secs(3600),
            snapshot_path: None,
            thresholds_path: None,
            thresholds: ThresholdConfig::default(),
            archive_retention_days: 90,
        }
    }
}

impl InsightsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let pass_interval = match optional_var("INSIGHTS_PASS_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse_number("INSIGHTS_PASS_INTERVAL_SECS", &raw)?),
            None => defaults.pass_interval,
        };

        let archive_retention_days = match optional_var("INSIGHTS_ARCHIVE_RETENTION_DAYS") {
            Some(raw) => parse_number("INSIGHTS_ARCHIVE_RETENTION_DAYS", &raw)?,
            None => defaults.archive_retention_days,
        };

        let mut thresholds = defaults.thresholds;
        if let Some(raw) = optional_var("INSIGHTS_OCCUPANCY_DIFFERENCE_PERCENT") {
            thresholds.occupancy_difference_percent =
                parse_number("INSIGHTS_OCCUPANCY_DIFFERENCE_PERCENT", &raw)?;
        }
        if let Some(raw) = optional_var("INSIGHTS_PRICING_DIFFERENCE_PERCENT") {
            thresholds.pricing_difference_percent =
                parse_number("INSIGHTS_PRICING_DIFFERENCE_PERCENT", &raw)?;
        }
        if let Some(raw) = optional_var("INSIGHTS_MIN_STAY_COMPARISON_ENABLED") {
            thresholds.min_stay_comparison_enabled =
                parse_bool("INSIGHTS_MIN_STAY_COMPARISON_ENABLED", &raw)?;
        }
        if let Some(raw) = optional_var("INSIGHTS_CLOSED_DAYS_THRESHOLD") {
            thresholds.closed_days_threshold =
                parse_number("INSIGHTS_CLOSED_DAYS_THRESHOLD", &raw)?;
        }
        thresholds
            .validate()
            .map_err(|source| ConfigError::InvalidThresholds { source })?;

        Ok(Self {
            pass_interval,
            snapshot_path: optional_var("INSIGHTS_SNAPSHOT_PATH").map(PathBuf::from),
            thresholds_path: optional_var("INSIGHTS_THRESHOLDS_PATH").map(PathBuf::from),
            thresholds,
            archive_retention_days,
        })
    }

    pub fn scheduler_enabled(&self) -> bool {
        !self.pass_interval.is_zero()
    }

    pub fn archive_retention(&self) -> Option<chrono::Duration> {
        (self.archive_retention_days > 0)
            .then(|| chrono::Duration::days(i64::from(self.archive_retention_days)))
    }
}

/// Read a JSON `ThresholdConfig` from disk. Fields missing from the file take their defaults.
pub fn load_threshold_file(path: &Path) -> Result<ThresholdConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ThresholdFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    let thresholds: ThresholdConfig =
        serde_json::from_str(&raw).map_err(|source| ConfigError::ThresholdFileFormat {
            path: path.to_path_buf(),
            source,
        })?;
    thresholds
        .validate()
        .map_err(|source| ConfigError::InvalidThresholds { source })?;
    Ok(thresholds)
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        key,
        value: raw.to_string(),
    })
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            key,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str, value: String },
    InvalidBoolean { key: &'static str, value: String },
    InvalidThresholds { source: ThresholdConfigError },
    ThresholdFileIo { path: PathBuf, source: std::io::Error },
    ThresholdFileFormat { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be numeric (got '{value}')")
            }
            ConfigError::InvalidBoolean { key, value } => {
                write!(f, "{key} must be true or false (got '{value}')")
            }
            ConfigError::InvalidThresholds { source } => {
                write!(f, "insight thresholds rejected: {source}")
            }
            ConfigError::ThresholdFileIo { path, .. } => {
                write!(f, "unable to read threshold file {}", path.display())
            }
            ConfigError::ThresholdFileFormat { path, .. } => {
                write!(f, "threshold file {} is not valid JSON", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidBoolean { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidThresholds { source } => Some(source),
            ConfigError::ThresholdFileIo { source, .. } => Some(source),
            ConfigError::ThresholdFileFormat { source, .. } => Some(source),
        }
    }
}
