//! Commit a staged database onto its final path.

use crate::error::RefreshError;
use crate::fetch::StagedFile;
use std::path::Path;

/// Move `staged` onto `target`.
///
/// Any existing target is removed first ("does not exist" is fine), then
/// the staged file is renamed into place. Both files live in the same
/// directory, so the rename is atomic. If the rename fails the staged file
/// is handed back to its temp guard and removed.
pub fn commit(staged: StagedFile, target: &Path) -> Result<(), RefreshError> {
    match std::fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(RefreshError::fs("remove", target, e)),
    }

    staged
        .into_temp_path()
        .persist(target)
        .map_err(|e| RefreshError::fs("rename", target, e.error))?;

    tracing::debug!(path = %target.display(), "committed staged database");
    Ok(())
}
