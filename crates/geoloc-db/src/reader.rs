//! Reader lifecycle: the current database handle and its safe replacement.
//!
//! The current handle lives in a single slot behind a read/write lock.
//! A lookup clones the `Arc` under the shared lock and queries after
//! releasing it, so lookups never wait on more than the pointer swap.
//! Reload opens the new reader outside the lock, swaps under the exclusive
//! lock, and drops the old `Arc` after the lock is released. The old reader
//! is closed when the last in-flight lookup that captured it finishes.

use crate::error::{LookupError, OpenError};
use crate::record::GeoRecord;
use parking_lot::RwLock;
use std::fmt;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An opened, query-ready database.
///
/// Dropping the reader closes it.
pub trait GeoReader: Send + Sync {
    /// Look up the record for `ip`.
    fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError>;

    /// Short human-readable description (database type, build date).
    fn description(&self) -> String;
}

/// Opens database files into readers.
pub trait ReaderOpener: Send + Sync {
    /// Open `path`. A missing file must be reported as [`OpenError::Missing`].
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError>;
}

/// Reader backed by the `maxminddb` crate.
pub struct MaxMindReader {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindReader {
    /// Read and parse the database at `path`.
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        let bytes = std::fs::read(path).map_err(|e| OpenError::from_io(path, e))?;
        let reader =
            maxminddb::Reader::from_source(bytes).map_err(|e| OpenError::Invalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self { reader })
    }
}

impl GeoReader for MaxMindReader {
    fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        self.reader
            .lookup::<GeoRecord>(ip)
            .map_err(|e| match e {
                maxminddb::MaxMindDBError::AddressNotFoundError(_) => LookupError::NotFound(ip),
                other => LookupError::Decode(other.to_string()),
            })
    }

    fn description(&self) -> String {
        let metadata = &self.reader.metadata;
        format!(
            "{} (build epoch {})",
            metadata.database_type, metadata.build_epoch
        )
    }
}

impl fmt::Debug for MaxMindReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaxMindReader")
            .field("database_type", &self.reader.metadata.database_type)
            .field("build_epoch", &self.reader.metadata.build_epoch)
            .finish()
    }
}

/// Opener for `.mmdb` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxMindOpener;

impl ReaderOpener for MaxMindOpener {
    fn open(&self, path: &Path) -> Result<Arc<dyn GeoReader>, OpenError> {
        Ok(Arc::new(MaxMindReader::open(path)?))
    }
}

/// Owns the current reader and swaps it on reload.
pub struct ReaderManager {
    path: PathBuf,
    opener: Arc<dyn ReaderOpener>,
    current: RwLock<Option<Arc<dyn GeoReader>>>,
}

impl ReaderManager {
    /// Manager for the database at `path`. No reader is open yet.
    pub fn new(path: impl Into<PathBuf>, opener: Arc<dyn ReaderOpener>) -> Self {
        Self {
            path: path.into(),
            opener,
            current: RwLock::new(None),
        }
    }

    /// Database path readers are opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current reader, if any. Holding the returned `Arc` keeps it open.
    pub fn current(&self) -> Option<Arc<dyn GeoReader>> {
        self.current.read().clone()
    }

    /// Look up `ip` in the current reader.
    pub fn lookup(&self, ip: IpAddr) -> Result<GeoRecord, LookupError> {
        let reader = self.current().ok_or(LookupError::DatabaseMissing)?;
        reader.lookup(ip)
    }

    /// Open the database again and make it current.
    ///
    /// On failure the previous reader stays current.
    pub fn reload(&self) -> Result<(), OpenError> {
        let reader = self.opener.open(&self.path)?;
        let description = reader.description();

        let previous = self.current.write().replace(reader);
        // lock released; in-flight lookups keep their own clone
        drop(previous);

        tracing::debug!(path = %self.path.display(), database = %description, "reader swapped");
        Ok(())
    }

    /// Whether a reader is open.
    pub fn ready(&self) -> bool {
        self.current.read().is_some()
    }

    /// Release the current reader. Calling it again is a no-op.
    pub fn close(&self) {
        let previous = self.current.write().take();
        drop(previous);
    }
}

impl fmt::Debug for ReaderManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderManager")
            .field("path", &self.path)
            .field("ready", &self.ready())
            .finish_non_exhaustive()
    }
}
