//! The GeoIP service: lookups against the current database plus refresh.

use crate::config::DatabaseConfig;
use crate::error::{LookupError, OpenError, RefreshError, ServiceError};
use crate::policy::{RefreshPolicy, UpdateStatus};
use crate::reader::{MaxMindOpener, ReaderManager, ReaderOpener};
use crate::record::GeoRecord;
use crate::transport::with_deadline;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Serves lookups and keeps the database fresh.
///
/// Construction opens the configured database, downloading it first when it
/// is missing and a license key is available.
#[derive(Debug)]
pub struct GeoIpService {
    config: DatabaseConfig,
    manager: Arc<ReaderManager>,
    policy: Option<RefreshPolicy>,
}

impl GeoIpService {
    /// Open the service with the `maxminddb` reader.
    pub async fn new(config: DatabaseConfig) -> Result<Self, ServiceError> {
        Self::with_opener(config, Arc::new(MaxMindOpener)).await
    }

    /// Open the service with a custom reader implementation.
    pub async fn with_opener(
        config: DatabaseConfig,
        opener: Arc<dyn ReaderOpener>,
    ) -> Result<Self, ServiceError> {
        let policy = if config.has_license_key() {
            Some(RefreshPolicy::with_opener(config.clone(), Arc::clone(&opener))?)
        } else {
            None
        };

        let service = Self {
            manager: Arc::new(ReaderManager::new(config.database_path.clone(), opener)),
            policy,
            config,
        };
        service.open_or_initialize().await?;

        tracing::info!(path = %service.config.database_path.display(), "database ready");
        Ok(service)
    }

    async fn open_or_initialize(&self) -> Result<(), ServiceError> {
        let err = match self.reload().await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        let Some(policy) = self.policy.as_ref().filter(|_| err.is_missing()) else {
            return Err(err.into());
        };

        tracing::info!(
            path = %self.config.database_path.display(),
            "database missing, downloading"
        );
        with_deadline(self.config.request_timeout, policy.ensure_latest(true)).await?;
        self.reload().await?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), OpenError> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.reload())
            .await
            .map_err(|e| OpenError::Worker(e.to_string()))?
    }

    /// Look up `ip` in the current database.
    pub fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        let mut record = self.manager.lookup(ip)?;
        record.ip = ip.to_string();
        Ok(record)
    }

    /// Parse `address` and look it up.
    pub fn lookup_str(&self, address: &str) -> Result<GeoRecord, LookupError> {
        let address = address.trim();
        let ip = address
            .parse::<IpAddr>()
            .map_err(|_| LookupError::InvalidAddress(address.to_string()))?;
        self.lookup(ip)
    }

    /// Refresh the database, reloading the reader when a new file was
    /// installed.
    ///
    /// Downloads are opened with the service's reader before they replace
    /// the installed file. A failed refresh leaves the current reader
    /// serving.
    pub async fn update(&self, force: bool) -> Result<UpdateStatus, ServiceError> {
        let policy = self
            .policy
            .as_ref()
            .ok_or(RefreshError::CredentialMissing)?;

        let status = policy.ensure_latest(force).await?;
        if status.updated {
            self.reload().await?;
            tracing::info!(
                path = %self.config.database_path.display(),
                reason = %status.reason,
                "database reloaded"
            );
        } else {
            tracing::debug!(reason = %status.reason, "database not updated");
        }
        Ok(status)
    }

    /// Whether a reader is open.
    pub fn ready(&self) -> bool {
        self.manager.ready()
    }

    /// Path of the database file.
    pub fn database_path(&self) -> &Path {
        &self.config.database_path
    }

    /// Configuration in use.
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Whether `update` can contact the distribution endpoint.
    pub const fn can_update(&self) -> bool {
        self.policy.is_some()
    }

    /// Release the reader. Later lookups fail with `DatabaseMissing`.
    pub fn close(&self) {
        self.manager.close();
        tracing::debug!(path = %self.config.database_path.display(), "database closed");
    }
}
