//! Error types for the GeoIP server.
//!
//! All errors use thiserror for consistent error handling across the codebase.

use geoloc_db::ServiceError;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Duration string could not be parsed
    #[error("Invalid duration '{value}': {reason}")]
    InvalidDuration {
        /// The rejected input
        value: String,
        /// Reason for rejection
        reason: String,
    },

    /// Endpoint URL is not http(s)
    #[error("Invalid {name} URL '{value}': expected an http:// or https:// URL")]
    InvalidUrl {
        /// Which setting was rejected
        name: &'static str,
        /// The rejected URL
        value: String,
    },

    /// Setting has a value outside its allowed range
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Server runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind HTTP server
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    HttpBindFailed {
        /// Address that failed to bind
        addr: std::net::SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// GeoIP service failed to start
    #[error("GeoIP service error: {0}")]
    Service(#[from] ServiceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server shutdown error
    #[error("Server shutdown error: {0}")]
    Shutdown(String),
}
