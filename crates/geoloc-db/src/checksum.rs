//! Local and remote checksum bookkeeping.
//!
//! The checksum record is a sidecar text file holding the remote checksum
//! token of the last successful install. Comparing it with the token the
//! remote publishes now decides whether a download is worth doing.

use crate::config::DatabaseConfig;
use crate::error::RefreshError;
use crate::transport::{DistributionClient, with_deadline};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Reads the local checksum record and fetches the authoritative one.
#[derive(Debug, Clone)]
pub struct ChecksumOracle {
    client: DistributionClient,
    database_path: PathBuf,
    checksum_path: PathBuf,
    checksum_url: String,
}

impl ChecksumOracle {
    /// Create an oracle for the database described by `config`.
    pub fn new(client: DistributionClient, config: &DatabaseConfig) -> Self {
        Self {
            client,
            database_path: config.database_path.clone(),
            checksum_path: config.checksum_path(),
            checksum_url: config.checksum_url.clone(),
        }
    }

    /// Path of the checksum record.
    pub fn checksum_path(&self) -> &Path {
        &self.checksum_path
    }

    /// Checksum of the installed database, if there is a baseline.
    ///
    /// Returns `None` when either the database or its record is absent.
    pub fn local_checksum(&self) -> Result<Option<String>, RefreshError> {
        if !is_file(&self.database_path) || !is_file(&self.checksum_path) {
            return Ok(None);
        }

        match std::fs::read_to_string(&self.checksum_path) {
            Ok(contents) => {
                let trimmed = contents.trim();
                Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RefreshError::fs("read", &self.checksum_path, e)),
        }
    }

    /// Fetch the checksum token the remote currently publishes.
    pub async fn remote_checksum(&self, timeout: Duration) -> Result<String, RefreshError> {
        with_deadline(timeout, async {
            let response = self.client.get(&self.checksum_url).await?;
            let body = response.text().await?;
            Ok(body.trim().to_string())
        })
        .await
    }

    /// Whether the remote has something newer than the local baseline.
    ///
    /// Returns the remote token alongside the decision so the caller can
    /// record it after installing.
    pub async fn should_download(&self, timeout: Duration) -> Result<(bool, String), RefreshError> {
        let local = self.local_checksum()?;
        let remote = self.remote_checksum(timeout).await?;

        let download = match local.as_deref() {
            None => true,
            Some(local) => !checksums_match(local, &remote),
        };

        tracing::debug!(
            local = local.as_deref().unwrap_or(""),
            remote = remote.as_str(),
            download,
            "compared database checksums"
        );

        Ok((download, remote))
    }

    /// Persist `checksum` as the new record, replacing it atomically.
    pub fn record(&self, checksum: &str) -> Result<(), RefreshError> {
        let dir = match self.checksum_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = tempfile::Builder::new()
            .prefix(".geoip-checksum-")
            .tempfile_in(dir)
            .map_err(|e| RefreshError::fs("create", dir, e))?;
        writeln!(staged, "{}", checksum.trim())
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| RefreshError::fs("write", staged.path().to_path_buf(), e))?;

        staged
            .persist(&self.checksum_path)
            .map_err(|e| RefreshError::fs("rename", &self.checksum_path, e.error))?;
        Ok(())
    }
}

/// Case-insensitive token comparison.
pub fn checksums_match(local: &str, remote: &str) -> bool {
    local.trim().eq_ignore_ascii_case(remote.trim())
}

/// The SHA-256 digest embedded in a checksum token, if it carries one.
///
/// Tokens look like `"<hex digest>  <file name>"`; only the first field is
/// considered and only when it is 64 hex characters.
pub fn published_sha256(token: &str) -> Option<&str> {
    let digest = token.split_whitespace().next()?;
    (digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit())).then_some(digest)
}

pub(crate) fn is_file(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|meta| !meta.is_dir())
}
