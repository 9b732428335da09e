//! Refresh policy: decide whether to refresh, then fetch and install.
//!
//! The decision runs through these gates in order:
//!
//! 1. forced refresh -> install
//! 2. database missing -> install
//! 3. database younger than the minimum refresh interval -> nothing to do,
//!    without touching the network
//! 4. remote checksum equal to the local record -> nothing to do,
//!    otherwise install
//!
//! Installing stages the archive member, resolves the remote checksum,
//! optionally verifies the archive digest, opens the staged file with the
//! reader, commits it and finally rewrites the checksum record. A staged
//! file the reader rejects never replaces the installed database.

use crate::checksum::{ChecksumOracle, is_file, published_sha256};
use crate::config::DatabaseConfig;
use crate::error::RefreshError;
use crate::fetch::{ArchiveFetcher, StagedFile};
use crate::reader::{MaxMindOpener, ReaderOpener};
use crate::replace;
use crate::transport::DistributionClient;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Where the refresh state machine ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Caller asked to skip every gate
    Forced,
    /// No database on disk
    NeedsInstall,
    /// Database is younger than the minimum refresh interval
    WithinRefreshWindow {
        /// Time since the database was last modified
        age: Duration,
        /// Configured minimum interval
        window: Duration,
    },
    /// Local gates passed; the remote checksum decides
    CheckPending,
    /// Remote checksum matches the local record
    UpToDate,
    /// Remote checksum differs from the local record
    NeedsUpdate,
    /// The last attempt failed
    Failed,
}

impl RefreshState {
    /// Whether this state leads to a fetch and install.
    pub const fn should_refresh(self) -> bool {
        matches!(self, Self::Forced | Self::NeedsInstall | Self::NeedsUpdate)
    }

    /// Human-readable reason reported to callers.
    pub fn reason(self) -> String {
        match self {
            Self::Forced => "force update requested".to_string(),
            Self::NeedsInstall => "database file missing".to_string(),
            Self::WithinRefreshWindow { age, window } => format!(
                "last update {} ago, minimum refresh window {}",
                format_duration(age),
                format_duration(window)
            ),
            Self::CheckPending => "remote checksum not yet checked".to_string(),
            Self::UpToDate => "database already up to date".to_string(),
            Self::NeedsUpdate => "remote checksum changed".to_string(),
            Self::Failed => "last refresh failed".to_string(),
        }
    }
}

/// Outcome of the decision phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshDecision {
    /// Final gate state
    pub state: RefreshState,
    /// Whether a fetch and install should follow
    pub should_refresh: bool,
    /// Reason reported to callers
    pub reason: String,
    /// Remote checksum, when the decision already fetched it
    pub remote_checksum: Option<String>,
}

impl RefreshDecision {
    fn from_state(state: RefreshState, remote_checksum: Option<String>) -> Self {
        Self {
            state,
            should_refresh: state.should_refresh(),
            reason: state.reason(),
            remote_checksum,
        }
    }
}

/// Result of [`RefreshPolicy::ensure_latest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    /// Whether a new database was installed
    pub updated: bool,
    /// Why the call did or did not install
    pub reason: String,
}

/// Keeps the on-disk database current.
pub struct RefreshPolicy {
    config: DatabaseConfig,
    oracle: ChecksumOracle,
    fetcher: ArchiveFetcher,
    validator: Arc<dyn ReaderOpener>,
    last_state: Mutex<Option<RefreshState>>,
}

impl RefreshPolicy {
    /// Create a policy validating downloads with the `maxminddb` reader.
    ///
    /// Fails with [`RefreshError::CredentialMissing`] when `config` has no
    /// license key.
    pub fn new(config: DatabaseConfig) -> Result<Self, RefreshError> {
        Self::with_opener(config, Arc::new(MaxMindOpener))
    }

    /// Create a policy validating downloads with `validator` before they
    /// are committed.
    pub fn with_opener(
        config: DatabaseConfig,
        validator: Arc<dyn ReaderOpener>,
    ) -> Result<Self, RefreshError> {
        let client = DistributionClient::from_config(&config)?;
        Ok(Self {
            oracle: ChecksumOracle::new(client.clone(), &config),
            fetcher: ArchiveFetcher::new(client, &config),
            validator,
            config,
            last_state: Mutex::new(None),
        })
    }

    /// Configuration in use.
    pub const fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// State reached by the most recent `ensure_latest`, if any ran.
    pub fn last_state(&self) -> Option<RefreshState> {
        *self.last_state.lock()
    }

    /// The network-free part of the decision.
    ///
    /// Returns `Forced`, `NeedsInstall`, `WithinRefreshWindow` or
    /// `CheckPending`.
    pub fn gate(&self, force: bool) -> Result<RefreshState, RefreshError> {
        if force {
            return Ok(RefreshState::Forced);
        }

        let path = &self.config.database_path;
        if !is_file(path) {
            return Ok(RefreshState::NeedsInstall);
        }

        let window = self.config.min_refresh_interval;
        if !window.is_zero() {
            let age = database_age(path)?;
            if age < window {
                return Ok(RefreshState::WithinRefreshWindow { age, window });
            }
        }

        Ok(RefreshState::CheckPending)
    }

    /// Decide whether to refresh, consulting the remote only when the
    /// local gates allow it.
    pub async fn decide(&self, force: bool) -> Result<RefreshDecision, RefreshError> {
        let state = self.gate(force)?;
        if state != RefreshState::CheckPending {
            return Ok(RefreshDecision::from_state(state, None));
        }

        let (download, remote) = self
            .oracle
            .should_download(self.config.request_timeout)
            .await?;
        let state = if download {
            RefreshState::NeedsUpdate
        } else {
            RefreshState::UpToDate
        };
        Ok(RefreshDecision::from_state(state, Some(remote)))
    }

    /// Bring the database up to date.
    ///
    /// On error nothing is committed unless the failure happened after the
    /// database was replaced, and the checksum record is only ever written
    /// after a successful replacement.
    pub async fn ensure_latest(&self, force: bool) -> Result<UpdateStatus, RefreshError> {
        let result = self.run(force).await;
        *self.last_state.lock() = Some(match &result {
            Ok((state, _)) => *state,
            Err(_) => RefreshState::Failed,
        });
        result.map(|(_, status)| status)
    }

    async fn run(&self, force: bool) -> Result<(RefreshState, UpdateStatus), RefreshError> {
        let decision = self.decide(force).await?;
        tracing::debug!(state = ?decision.state, reason = %decision.reason, "refresh decision");

        if decision.should_refresh {
            self.install(decision.remote_checksum).await?;
        }

        Ok((
            decision.state,
            UpdateStatus {
                updated: decision.should_refresh,
                reason: decision.reason,
            },
        ))
    }

    async fn install(&self, remote_checksum: Option<String>) -> Result<(), RefreshError> {
        let timeout = self.config.request_timeout;
        let staged = self.fetcher.fetch(timeout).await?;

        let checksum = match remote_checksum {
            Some(checksum) => checksum,
            None => self.oracle.remote_checksum(timeout).await?,
        };

        if self.config.verify_archive_digest
            && let Some(expected) = published_sha256(&checksum)
            && !expected.eq_ignore_ascii_case(staged.archive_sha256())
        {
            return Err(RefreshError::ChecksumMismatch {
                expected: expected.to_ascii_lowercase(),
                actual: staged.archive_sha256().to_string(),
            });
        }

        let validator = Arc::clone(&self.validator);
        let oracle = self.oracle.clone();
        let target = self.config.database_path.clone();
        let record = checksum.clone();
        tokio::task::spawn_blocking(move || {
            commit_validated(staged, &target, validator.as_ref(), &oracle, &record)
        })
        .await
        .map_err(|e| RefreshError::Worker(e.to_string()))??;

        tracing::info!(
            path = %self.config.database_path.display(),
            checksum = %checksum,
            "installed database"
        );
        Ok(())
    }
}

impl fmt::Debug for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshPolicy")
            .field("database_path", &self.config.database_path)
            .field("last_state", &self.last_state())
            .finish_non_exhaustive()
    }
}

/// Open `staged` with `validator`, then move it onto `target` and record
/// `checksum`. Runs on the blocking pool.
fn commit_validated(
    staged: StagedFile,
    target: &Path,
    validator: &dyn ReaderOpener,
    oracle: &ChecksumOracle,
    checksum: &str,
) -> Result<(), RefreshError> {
    let reader = validator
        .open(staged.path())
        .map_err(RefreshError::InvalidDatabase)?;
    tracing::debug!(database = %reader.description(), "staged database opens");
    drop(reader);

    replace::commit(staged, target)?;
    oracle.record(checksum)
}

/// Time since `path` was last modified. A future timestamp counts as zero.
fn database_age(path: &Path) -> Result<Duration, RefreshError> {
    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| RefreshError::fs("stat", path, e))?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

/// Render a duration as `1h2m3s`, rounded to whole seconds.
pub fn format_duration(duration: Duration) -> String {
    let secs = (duration.as_millis() + 500) / 1000;
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
