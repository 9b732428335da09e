//! Server configuration management.
//!
//! Configuration is loaded from CLI arguments with environment variable
//! fallbacks (`GEOLOC_HTTP_BIND`, `MAXMIND_DB_PATH`, `MAXMIND_KEY`, ...)
//! and default values.
//!
//! # Example
//!
//! ```no_run
//! use geoloc_server::ServerConfig;
//!
//! let config = ServerConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("HTTP server will bind to: {}", config.http_bind);
//! println!("Database: {}", config.database_path.display());
//! ```

use crate::error::ConfigError;
use clap::Parser;
use geoloc_db::DatabaseConfig;
use geoloc_db::config::{DEFAULT_CHECKSUM_URL, DEFAULT_DATABASE_PATH, DEFAULT_DOWNLOAD_URL};
use geoloc_db::transport::redact_url;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "geoloc-server",
    about = "GeoIP lookup server backed by a self-refreshing MaxMind database",
    version
)]
pub struct ServerConfig {
    /// HTTP bind address
    #[arg(long, env = "GEOLOC_HTTP_BIND", default_value = "0.0.0.0:5000")]
    pub http_bind: SocketAddr,

    /// Path of the GeoLite2-City database file
    #[arg(long, env = "MAXMIND_DB_PATH", default_value = DEFAULT_DATABASE_PATH)]
    pub database_path: PathBuf,

    /// MaxMind license key (downloads are disabled without one)
    #[arg(long, env = "MAXMIND_KEY", hide_env_values = true)]
    pub license_key: Option<String>,

    /// Archive download URL
    #[arg(long, env = "MAXMIND_DOWNLOAD_URL", default_value = DEFAULT_DOWNLOAD_URL)]
    pub download_url: String,

    /// Checksum URL
    #[arg(long, env = "MAXMIND_CHECKSUM_URL", default_value = DEFAULT_CHECKSUM_URL)]
    pub checksum_url: String,

    /// Timeout for distribution requests and `/updatedb` calls
    #[arg(long, env = "MAXMIND_HTTP_TIMEOUT", default_value = "30s", value_parser = parse_duration)]
    pub http_timeout: Duration,

    /// Minimum age of the database before the remote is consulted (0 disables)
    #[arg(long, env = "MAXMIND_REFRESH_INTERVAL", default_value = "24h", value_parser = parse_duration)]
    pub refresh_interval: Duration,

    /// Period of the background refresh task (disabled when unset)
    #[arg(long, env = "MAXMIND_AUTO_UPDATE", value_parser = parse_duration)]
    pub auto_update: Option<Duration>,

    /// Refuse archives whose SHA-256 differs from the published digest
    #[arg(long, env = "MAXMIND_VERIFY_DIGEST")]
    pub verify_archive_digest: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            license_key: None,
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            checksum_url: DEFAULT_CHECKSUM_URL.to_string(),
            http_timeout: geoloc_db::config::DEFAULT_REQUEST_TIMEOUT,
            refresh_interval: geoloc_db::config::DEFAULT_MIN_REFRESH_INTERVAL,
            auto_update: None,
            verify_archive_digest: false,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Check if a license key is configured.
    pub fn has_license_key(&self) -> bool {
        self.license_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the database path is empty
    /// - an endpoint URL is not http(s)
    /// - the HTTP timeout or the auto-update period is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "database path must not be empty".to_string(),
            ));
        }

        for (name, value) in [("download", &self.download_url), ("checksum", &self.checksum_url)] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    name,
                    value: redact_url(value),
                });
            }
        }

        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "HTTP timeout must be positive".to_string(),
            ));
        }

        if self.auto_update.is_some_and(|period| period.is_zero()) {
            return Err(ConfigError::InvalidValue(
                "auto update period must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Database configuration for the GeoIP service.
    pub fn database_config(&self) -> DatabaseConfig {
        let mut config = DatabaseConfig::new(&self.database_path)
            .with_download_url(&self.download_url)
            .with_checksum_url(&self.checksum_url)
            .with_request_timeout(self.http_timeout)
            .with_min_refresh_interval(self.refresh_interval)
            .with_archive_digest_verification(self.verify_archive_digest);
        if let Some(key) = &self.license_key {
            config = config.with_license_key(key);
        }
        config
    }
}

/// Parse a duration such as `30s`, `1h30m`, `250ms` or a bare number of
/// seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let input = value.trim();
    if input.is_empty() {
        return Err(invalid("empty value"));
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(invalid("expected a number"));
        }
        let amount: u64 = rest[..digits]
            .parse()
            .map_err(|_| invalid("number out of range"))?;
        rest = &rest[digits..];

        let unit_len = rest.bytes().take_while(u8::is_ascii_alphabetic).count();
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.saturating_mul(60)),
            "h" => Duration::from_secs(amount.saturating_mul(3600)),
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit, expected ms, s, m or h")),
        };
        rest = &rest[unit_len..];
        total = total.saturating_add(part);
    }

    Ok(total)
}
