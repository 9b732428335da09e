//! Error types for the GeoIP database subsystem.
//!
//! Each concern gets its own enum: refreshing the artifact, opening a
//! reader, looking up an address, and the service facade that ties the
//! three together.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while checking for, fetching, or installing a database update.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// No license key configured; the remote is never contacted.
    #[error("maxmind license key not configured")]
    CredentialMissing,

    /// The distribution endpoint rejected the license key.
    #[error("invalid license key")]
    CredentialInvalid,

    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    HttpStatus {
        /// Redacted request URL (no credentials)
        url: String,
        /// Response status
        status: reqwest::StatusCode,
    },

    /// A network call did not finish before its deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The URL could not be parsed.
    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidUrl {
        /// The URL as configured
        url: String,
        /// Parser message
        reason: String,
    },

    /// The archive was readable but did not contain the expected member.
    #[error("invalid download: {0}")]
    ArchiveCorrupt(String),

    /// The downloaded archive does not match the published SHA-256.
    #[error("archive checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest published by the remote
        expected: String,
        /// Digest of the bytes received
        actual: String,
    },

    /// The staged database could not be opened, so it was not installed.
    #[error("downloaded database is unusable: {0}")]
    InvalidDatabase(#[source] OpenError),

    /// Staging, committing, or bookkeeping on the local filesystem failed.
    #[error("failed to {action} {}: {source}", path.display())]
    Filesystem {
        /// What was being attempted ("create", "rename", ...)
        action: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Worker(String),
}

impl RefreshError {
    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while opening a database file into a reader.
#[derive(Debug, Error)]
pub enum OpenError {
    /// The database file does not exist.
    #[error("database file not found: {}", path.display())]
    Missing {
        /// Path that was opened
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("failed to read database {}: {source}", path.display())]
    Io {
        /// Path that was opened
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file was read but is not a valid database.
    #[error("invalid database {}: {reason}", path.display())]
    Invalid {
        /// Path that was opened
        path: PathBuf,
        /// Reader message
        reason: String,
    },

    /// A blocking worker panicked or was cancelled.
    #[error("background task failed: {0}")]
    Worker(String),
}

impl OpenError {
    /// Classify an I/O error from reading `path`, keeping "not found" distinct.
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::Missing { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Whether the failure means "no database yet" rather than a broken one.
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing { .. })
    }
}

/// Errors raised by point lookups.
#[derive(Debug, Error)]
pub enum LookupError {
    /// No reader is loaded.
    #[error("maxmind database not loaded")]
    DatabaseMissing,

    /// The address could not be parsed.
    #[error("invalid IP address: {0:?}")]
    InvalidAddress(String),

    /// The address is not present in the database.
    #[error("address not found in database: {0}")]
    NotFound(IpAddr),

    /// The record could not be decoded.
    #[error("failed to decode record: {0}")]
    Decode(String),
}

/// Errors surfaced by [`GeoIpService`](crate::GeoIpService).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Refresh failure
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// Reader open failure
    #[error("open maxmind database: {0}")]
    Open(#[from] OpenError),
}

impl ServiceError {
    /// True when the update was refused because no license key is configured.
    pub const fn is_credential_missing(&self) -> bool {
        matches!(self, Self::Refresh(RefreshError::CredentialMissing))
    }
}
