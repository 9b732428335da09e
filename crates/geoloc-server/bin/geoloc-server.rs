//! GeoIP server binary entry point.
//!
//! This is a thin wrapper around the geoloc-server library that:
//! 1. Initializes logging
//! 2. Parses and validates configuration
//! 3. Opens the database, downloading it if needed
//! 4. Starts the server
//!
//! For library usage, see the geoloc-server crate documentation.

use anyhow::Result;
use geoloc_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("GeoIP server starting...");

    let config = ServerConfig::from_args();

    tracing::info!(
        "Configuration loaded: HTTP={}, database={}, refresh_interval={:?}, auto_update={:?}",
        config.http_bind,
        config.database_path.display(),
        config.refresh_interval,
        config.auto_update
    );

    config.validate()?;

    let server = Server::new(config).await?;
    server.run().await?;

    Ok(())
}
