//! Startup settings.
//!
//! Keys use the environment-variable names (`JWT_SECRET_KEY`,
//! `SERVICENOW_INSTANCE_URL`, ...). Sources are layered, later wins:
//!
//! 1. an optional config file (`.toml`, `.yaml`/`.yml`, `.json`) with the
//!    same keys in lowercase
//! 2. the process environment, after any `.env` file has been loaded
//!
//! Values are read once and frozen into [`JwtConfig`], [`ServiceNowConfig`]
//! and [`LoggingConfig`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;
use servicenow_mcp_auth::{JwtConfig, ServiceNowConfig, TokenError, parse_algorithm};
use thiserror::Error;

use crate::logging::{LogFormat, LoggingConfig};

/// Settings errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `--config` points at a missing file
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Unknown config file extension
    #[error("Unsupported configuration file format: {0} (use .toml, .yaml, .yml or .json)")]
    UnsupportedFormat(PathBuf),

    /// The `config` crate failed to read or merge a source
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A key holds an unusable value
    #[error("Invalid value for {key}: {message}")]
    Invalid {
        /// Setting name
        key: &'static str,
        /// What is wrong
        message: String,
    },

    /// JWT settings rejected by the auth crate
    #[error(transparent)]
    Jwt(#[from] TokenError),
}

/// Raw key/value view of every source, before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    jwt_secret_key: Option<String>,
    jwt_algorithm: Option<String>,
    jwt_expiry_hours: Option<String>,
    jwt_refresh_expiry_days: Option<String>,
    jwt_issuer: Option<String>,
    jwt_audience: Option<String>,
    servicenow_instance_url: Option<String>,
    servicenow_username: Option<String>,
    servicenow_password: Option<String>,
    servicenow_jwt_token: Option<String>,
    servicenow_client_id: Option<String>,
    servicenow_timeout_secs: Option<String>,
    log_level: Option<String>,
    log_format: Option<String>,
    log_dir: Option<String>,
}

/// Validated settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Token signing configuration
    pub jwt: JwtConfig,
    /// ServiceNow connection
    pub servicenow: ServiceNowConfig,
    /// Logging
    pub logging: LoggingConfig,
}

impl Settings {
    /// Load from an optional file plus the process environment.
    ///
    /// # Errors
    ///
    /// See [`SettingsError`].
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::from_sources(file, None)
    }

    /// Load from an optional file plus `env`, or the process environment
    /// when `env` is `None`.
    ///
    /// # Errors
    ///
    /// See [`SettingsError`].
    pub fn from_sources(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, SettingsError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            let format = file_format(path)?;
            builder = builder.add_source(File::from(path).format(format));
        }
        let config = builder
            .add_source(Environment::default().ignore_empty(true).source(env))
            .build()?;

        let raw: RawSettings = config.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let mut jwt = JwtConfig::builder().maybe_secret(non_empty(raw.jwt_secret_key));
        if let Some(name) = non_empty(raw.jwt_algorithm) {
            jwt = jwt.algorithm(parse_algorithm(&name)?);
        }
        if let Some(hours) = positive("JWT_EXPIRY_HOURS", raw.jwt_expiry_hours)? {
            jwt = jwt.access_ttl_hours(hours);
        }
        if let Some(days) = positive("JWT_REFRESH_EXPIRY_DAYS", raw.jwt_refresh_expiry_days)? {
            jwt = jwt.refresh_ttl_days(days);
        }
        if let Some(issuer) = non_empty(raw.jwt_issuer) {
            jwt = jwt.issuer(issuer);
        }
        if let Some(audience) = non_empty(raw.jwt_audience) {
            jwt = jwt.audience(audience);
        }
        let jwt = jwt.build()?;

        let mut servicenow = ServiceNowConfig {
            instance_url: non_empty(raw.servicenow_instance_url),
            username: non_empty(raw.servicenow_username),
            password: non_empty(raw.servicenow_password).map(SecretString::new),
            jwt_token: non_empty(raw.servicenow_jwt_token).map(SecretString::new),
            client_id: non_empty(raw.servicenow_client_id),
            ..ServiceNowConfig::default()
        };
        if let Some(secs) = positive("SERVICENOW_TIMEOUT_SECS", raw.servicenow_timeout_secs)? {
            servicenow.timeout = Duration::from_secs(secs);
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = non_empty(raw.log_level) {
            logging.level = level;
        }
        if let Some(format) = non_empty(raw.log_format) {
            logging.format = format
                .parse::<LogFormat>()
                .map_err(|message| SettingsError::Invalid {
                    key: "LOG_FORMAT",
                    message,
                })?;
        }
        logging.directory = non_empty(raw.log_dir).map(PathBuf::from);

        Ok(Self {
            jwt,
            servicenow,
            logging,
        })
    }
}

fn file_format(path: &Path) -> Result<FileFormat, SettingsError> {
    if !path.exists() {
        return Err(SettingsError::FileNotFound(path.to_path_buf()));
    }
    match path.extension().and_then(|s| s.to_str()) {
        Some("toml") => Ok(FileFormat::Toml),
        Some("yaml" | "yml") => Ok(FileFormat::Yaml),
        Some("json") => Ok(FileFormat::Json),
        _ => Err(SettingsError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn positive(key: &'static str, value: Option<String>) -> Result<Option<u64>, SettingsError> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(0) => Err(SettingsError::Invalid {
            key,
            message: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(SettingsError::Invalid {
            key,
            message: format!("expected a positive integer, got '{value}'"),
        }),
    }
}
