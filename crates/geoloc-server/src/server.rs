//! Server state management and orchestration.
//!
//! Holds the GeoIP service shared by the HTTP handlers and the background
//! refresh task, and drives startup and graceful shutdown.

use crate::config::ServerConfig;
use crate::error::ServerError;
use async_trait::async_trait;
use geoloc_db::{GeoIpService, GeoRecord, LookupError, ServiceError, UpdateStatus};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// The operations the HTTP layer needs from the GeoIP service.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Look up a textual address.
    fn lookup(&self, address: &str) -> Result<GeoRecord, LookupError>;

    /// Refresh the database.
    async fn update(&self, force: bool) -> Result<UpdateStatus, ServiceError>;

    /// Whether a database is loaded.
    fn ready(&self) -> bool;

    /// Path of the database file.
    fn database_path(&self) -> PathBuf;

    /// Release the database.
    fn close(&self);
}

#[async_trait]
impl GeoLookup for GeoIpService {
    fn lookup(&self, address: &str) -> Result<GeoRecord, LookupError> {
        self.lookup_str(address)
    }

    async fn update(&self, force: bool) -> Result<UpdateStatus, ServiceError> {
        Self::update(self, force).await
    }

    fn ready(&self) -> bool {
        Self::ready(self)
    }

    fn database_path(&self) -> PathBuf {
        Self::database_path(self).to_path_buf()
    }

    fn close(&self) {
        Self::close(self);
    }
}

/// Shared application state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// GeoIP service
    service: Arc<dyn GeoLookup>,

    /// Upper bound for one `/updatedb` call
    update_timeout: Duration,

    /// Server start time
    started_at: SystemTime,
}

impl AppState {
    /// Create application state around `service`.
    pub fn new(service: Arc<dyn GeoLookup>, update_timeout: Duration) -> Self {
        Self {
            service,
            update_timeout,
            started_at: SystemTime::now(),
        }
    }

    /// Get the GeoIP service.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn GeoLookup> {
        &self.service
    }

    /// Upper bound for one update request.
    #[must_use]
    pub const fn update_timeout(&self) -> Duration {
        self.update_timeout
    }

    /// Get server uptime in seconds.
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.started_at)
            .unwrap_or_default()
            .as_secs()
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("database_path", &self.service.database_path())
            .field("ready", &self.service.ready())
            .field("update_timeout", &self.update_timeout)
            .finish_non_exhaustive()
    }
}

/// Server orchestration.
#[derive(Debug)]
pub struct Server {
    /// Shared application state
    state: Arc<AppState>,
    /// Server configuration
    config: ServerConfig,
}

impl Server {
    /// Create a server, opening (and if needed downloading) the database.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the configuration is invalid or the
    /// database cannot be opened.
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        tracing::info!("Opening GeoIP database at {}", config.database_path.display());
        if !config.has_license_key() {
            tracing::warn!("No MaxMind license key configured, database updates are disabled");
        }

        let service = GeoIpService::new(config.database_config()).await?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Create a server around an existing service.
    pub fn with_service(config: ServerConfig, service: Arc<dyn GeoLookup>) -> Self {
        let state = AppState::new(service, config.http_timeout);
        Self {
            state: Arc::new(state),
            config,
        }
    }

    /// Get shared application state.
    #[must_use]
    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Run the server until a shutdown signal arrives.
    ///
    /// Starts the HTTP listener and, when configured, the background refresh
    /// task. On shutdown, in-flight requests are drained before the
    /// database is closed.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the server stops abnormally.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Starting GeoIP server");

        let refresh = self.config.auto_update.map(|period| {
            tracing::info!("Background refresh every {period:?}");
            crate::refresh::spawn_refresh_task(Arc::clone(self.state.service()), period)
        });

        let result =
            crate::http::start_server(self.config.http_bind, self.state.clone(), shutdown_signal())
                .await;

        if let Some(task) = refresh {
            task.abort();
        }
        self.state.service().close();
        tracing::info!("Server stopped");

        result
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping server");
}
