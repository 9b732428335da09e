//! GeoIP lookup server.
//!
//! This crate serves city-level lookups over HTTP from a MaxMind
//! GeoLite2-City database kept current by the `geoloc-db` crate.
//!
//! # Architecture
//!
//! The server uses a library-first design with the following components:
//! - `server`: Main server orchestration and shared state
//! - `config`: Configuration loading and validation
//! - `http`: HTTP server and handlers
//! - `refresh`: Optional background refresh task
//!
//! # Endpoints
//!
//! - `GET /ip?address=<ip>`: city record for an address
//! - `GET /healthz`: liveness
//! - `GET /readiness`: 503 until a database is loaded
//! - `GET /updatedb[?force=true]`: refresh the database now
//!
//! # Example
//!
//! ```no_run
//! use geoloc_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = ServerConfig::from_args();
//!     config.validate()?;
//!
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod http;
pub mod refresh;
pub mod server;

pub use config::ServerConfig;
pub use error::{ConfigError, ServerError};
pub use server::{AppState, GeoLookup, Server};
