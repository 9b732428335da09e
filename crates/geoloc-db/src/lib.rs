//! Self-refreshing GeoIP database.
//!
//! This crate keeps a local MaxMind GeoLite2-City database synchronized with
//! the distribution endpoint and answers lookups against it while it is
//! being replaced.
//!
//! # Architecture
//!
//! - `transport`: authenticated GETs against the distribution endpoint
//! - `checksum`: local checksum record and remote checksum comparison
//! - `fetch`: archive download, gzip+tar scan, staging next to the target
//! - `policy`: refresh gating and install
//! - `replace`: atomic commit of a staged file
//! - `reader`: current reader slot, concurrent lookups, hot swap
//! - `service`: the [`GeoIpService`] facade
//!
//! # Example
//!
//! ```no_run
//! use geoloc_db::{DatabaseConfig, GeoIpService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig::new("db/GeoLite2-City.mmdb").with_license_key("my-key");
//! let service = GeoIpService::new(config).await?;
//!
//! let record = service.lookup_str("81.2.69.142")?;
//! println!("{:?}", record.city_name());
//!
//! let status = service.update(false).await?;
//! println!("updated: {} ({})", status.updated, status.reason);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod policy;
pub mod reader;
pub mod record;
pub mod replace;
pub mod service;
pub mod transport;

pub use checksum::{ChecksumOracle, checksums_match};
pub use config::DatabaseConfig;
pub use error::{LookupError, OpenError, RefreshError, ServiceError};
pub use fetch::{ArchiveFetcher, StagedFile};
pub use policy::{RefreshDecision, RefreshPolicy, RefreshState, UpdateStatus};
pub use reader::{GeoReader, MaxMindOpener, MaxMindReader, ReaderManager, ReaderOpener};
pub use record::GeoRecord;
pub use service::GeoIpService;
pub use transport::DistributionClient;
