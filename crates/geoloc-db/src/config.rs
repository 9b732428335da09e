//! Configuration for the database refresh subsystem.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Remote archive endpoint (gzip-compressed tar).
pub const DEFAULT_DOWNLOAD_URL: &str =
    "https://download.maxmind.com/app/geoip_download?suffix=tar.gz";

/// Remote checksum endpoint for the archive.
pub const DEFAULT_CHECKSUM_URL: &str =
    "https://download.maxmind.com/app/geoip_download?suffix=tar.gz.sha256";

/// Suffix of the checksum sidecar written next to the database.
pub const CHECKSUM_SUFFIX: &str = ".sha256";

/// Extension of the database member inside the archive.
pub const DATABASE_EXTENSION: &str = ".mmdb";

/// Edition requested from the distribution endpoint.
pub const DEFAULT_EDITION_ID: &str = "GeoLite2-City";

/// Database location used when none is configured.
pub const DEFAULT_DATABASE_PATH: &str = "db/GeoLite2-City.mmdb";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default minimum age of the database before the remote is consulted.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Immutable settings shared by every component of the subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Location of the `.mmdb` file
    pub database_path: PathBuf,

    /// License key sent as the `license_key` query parameter
    pub license_key: Option<String>,

    /// Product identifier sent as the `edition_id` query parameter
    pub edition_id: String,

    /// Archive URL
    pub download_url: String,

    /// Checksum URL
    pub checksum_url: String,

    /// Deadline for each network call
    pub request_timeout: Duration,

    /// Skip remote checks while the database is younger than this.
    /// `Duration::ZERO` disables the gate.
    pub min_refresh_interval: Duration,

    /// Refuse archives whose SHA-256 differs from a digest published by the
    /// checksum endpoint. Off by default.
    pub verify_archive_digest: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            license_key: None,
            edition_id: DEFAULT_EDITION_ID.to_string(),
            download_url: DEFAULT_DOWNLOAD_URL.to_string(),
            checksum_url: DEFAULT_CHECKSUM_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            verify_archive_digest: false,
        }
    }
}

impl DatabaseConfig {
    /// Configuration for a database at `path` with every other value defaulted.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }

    /// Set the license key. Blank keys are treated as absent.
    #[must_use]
    pub fn with_license_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        let key = key.trim();
        self.license_key = (!key.is_empty()).then(|| key.to_string());
        self
    }

    /// Override the archive URL.
    #[must_use]
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    /// Override the checksum URL.
    #[must_use]
    pub fn with_checksum_url(mut self, url: impl Into<String>) -> Self {
        self.checksum_url = url.into();
        self
    }

    /// Override the edition identifier.
    #[must_use]
    pub fn with_edition_id(mut self, edition: impl Into<String>) -> Self {
        self.edition_id = edition.into();
        self
    }

    /// Override the request timeout. A zero timeout falls back to the default.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = if timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Override the minimum refresh interval (`Duration::ZERO` disables it).
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Check the archive against a published SHA-256 before installing.
    #[must_use]
    pub fn with_archive_digest_verification(mut self, enabled: bool) -> Self {
        self.verify_archive_digest = enabled;
        self
    }

    /// Path of the checksum sidecar (`database_path` + `.sha256`).
    pub fn checksum_path(&self) -> PathBuf {
        let mut path = self.database_path.clone().into_os_string();
        path.push(CHECKSUM_SUFFIX);
        PathBuf::from(path)
    }

    /// Directory holding the database, where staged files are created.
    pub fn database_dir(&self) -> &Path {
        match self.database_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Whether a license key is configured.
    pub const fn has_license_key(&self) -> bool {
        self.license_key.is_some()
    }
}
