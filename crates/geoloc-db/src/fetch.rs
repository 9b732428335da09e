//! Archive download and extraction.
//!
//! The distribution endpoint serves a gzip-compressed tar holding one
//! `.mmdb` member. The response body is spooled to an unlinked file in the
//! database directory while its SHA-256 is computed, then decoded on the
//! blocking pool. The member is staged as a named temp file in the same
//! directory so the commit is a same-filesystem rename.

use crate::config::{DATABASE_EXTENSION, DatabaseConfig};
use crate::error::RefreshError;
use crate::transport::{DistributionClient, with_deadline};
use flate2::read::GzDecoder;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// A fetched database waiting to be committed.
///
/// The staged file is removed when this value is dropped without being
/// committed.
#[derive(Debug)]
pub struct StagedFile {
    path: TempPath,
    archive_sha256: String,
}

impl StagedFile {
    pub(crate) fn from_parts(path: TempPath, archive_sha256: String) -> Self {
        Self {
            path,
            archive_sha256,
        }
    }

    /// Location of the staged database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex SHA-256 of the compressed archive as received.
    pub fn archive_sha256(&self) -> &str {
        &self.archive_sha256
    }

    pub(crate) fn into_temp_path(self) -> TempPath {
        self.path
    }
}

/// Downloads the archive and stages its database member.
#[derive(Debug, Clone)]
pub struct ArchiveFetcher {
    client: DistributionClient,
    download_url: String,
    target_dir: PathBuf,
}

impl ArchiveFetcher {
    /// Create a fetcher staging into the directory of `config.database_path`.
    pub fn new(client: DistributionClient, config: &DatabaseConfig) -> Self {
        Self {
            client,
            download_url: config.download_url.clone(),
            target_dir: config.database_dir().to_path_buf(),
        }
    }

    /// Download, decompress, and stage the database.
    ///
    /// `timeout` bounds the network phase. Nothing is left in the target
    /// directory on failure.
    pub async fn fetch(&self, timeout: Duration) -> Result<StagedFile, RefreshError> {
        let dir = self.target_dir.clone();
        let spool = tokio::task::spawn_blocking(move || create_spool(&dir))
            .await
            .map_err(|e| RefreshError::Worker(e.to_string()))??;

        let (spool, archive_sha256) = with_deadline(timeout, self.download_into(spool)).await?;

        let dir = self.target_dir.clone();
        let path = tokio::task::spawn_blocking(move || extract_database(spool, &dir))
            .await
            .map_err(|e| RefreshError::Worker(e.to_string()))??;

        tracing::debug!(path = %path.display(), "staged database from archive");

        Ok(StagedFile::from_parts(path, archive_sha256))
    }

    async fn download_into(&self, spool: File) -> Result<(File, String), RefreshError> {
        let response = self.client.get(&self.download_url).await?;

        let mut file = tokio::fs::File::from_std(spool);
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut received = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| RefreshError::fs("write spool in", &self.target_dir, e))?;
            received += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| RefreshError::fs("write spool in", &self.target_dir, e))?;

        tracing::debug!(bytes = received, "downloaded database archive");

        Ok((file.into_std().await, hex::encode(hasher.finalize())))
    }
}

/// Create the target directory and an unlinked spool file inside it.
fn create_spool(dir: &Path) -> Result<File, RefreshError> {
    std::fs::create_dir_all(dir).map_err(|e| RefreshError::fs("create directory", dir, e))?;
    tempfile::tempfile_in(dir).map_err(|e| RefreshError::fs("create spool in", dir, e))
}

/// Scan the gzip+tar stream in `spool` and stage the first `.mmdb` member.
pub fn extract_database(mut spool: File, dir: &Path) -> Result<TempPath, RefreshError> {
    spool
        .seek(SeekFrom::Start(0))
        .map_err(|e| RefreshError::fs("rewind spool in", dir, e))?;

    let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(spool)));
    let entries = archive.entries().map_err(decode_error)?;

    for entry in entries {
        let mut entry = entry.map_err(decode_error)?;

        let is_database = entry.header().entry_type().is_file()
            && entry
                .path()
                .is_ok_and(|p| p.to_string_lossy().ends_with(DATABASE_EXTENSION));
        if !is_database {
            continue;
        }

        let mut staged = tempfile::Builder::new()
            .prefix("geoip-")
            .suffix(DATABASE_EXTENSION)
            .tempfile_in(dir)
            .map_err(|e| RefreshError::fs("create staged file in", dir, e))?;

        let staged_path = staged.path().to_path_buf();
        copy_member(&mut entry, staged.as_file_mut(), &staged_path)?;

        staged
            .as_file()
            .sync_all()
            .map_err(|e| RefreshError::fs("sync", staged_path, e))?;

        return Ok(staged.into_temp_path());
    }

    Err(RefreshError::ArchiveCorrupt(format!(
        "archive doesn't contain a {DATABASE_EXTENSION} file"
    )))
}

/// Copy one member, keeping read (decode) and write (filesystem) failures apart.
fn copy_member<R: Read>(reader: &mut R, writer: &mut File, path: &Path) -> Result<u64, RefreshError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(decode_error(e)),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|e| RefreshError::fs("write", path.to_path_buf(), e))?;
        copied += read as u64;
    }

    Ok(copied)
}

fn decode_error(e: std::io::Error) -> RefreshError {
    RefreshError::ArchiveCorrupt(format!("failed to decode archive: {e}"))
}
