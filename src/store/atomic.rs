//! All-or-nothing file persistence.
//!
//! Data is written to a temporary file in the destination directory,
//! flushed and synced, then renamed over the final path, so readers never
//! observe a partially written file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::{NamedTempFile, TempPath};

use crate::error::{PokembedError, Result};

fn parent_dir(path: &Path) -> Result<&Path> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(PokembedError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("destination directory {} does not exist", parent.display()),
        )));
    }
    Ok(parent)
}

/// Write `bytes` to a synced temporary file next to `path`.
fn stage(path: &Path, bytes: &[u8]) -> Result<TempPath> {
    let dir = parent_dir(path)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.as_file().sync_all()?;
    Ok(file.into_temp_path())
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let staged = stage(path, bytes)?;
    staged.persist(path).map_err(|e| PokembedError::Io(e.error))?;
    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Move an existing file at `path` aside so it can be restored.
///
/// The backup lives in the same directory and is deleted when dropped.
fn back_up(path: &Path) -> Result<Option<TempPath>> {
    if !path.is_file() {
        return Ok(None);
    }
    let backup = NamedTempFile::new_in(parent_dir(path)?)?.into_temp_path();
    fs::rename(path, &backup)?;
    Ok(Some(backup))
}

/// Undo the renames of a failed [`write_all_atomic`], newest first.
///
/// Targets that had a previous file get it back; targets that did not are
/// removed only if this call actually created them.
fn roll_back(done: Vec<(&PathBuf, Option<TempPath>, bool)>) {
    for (path, backup, persisted) in done.into_iter().rev() {
        match backup {
            Some(backup) => {
                if let Err(e) = backup.persist(path) {
                    warn!("Failed to restore {}: {}", path.display(), e.error);
                }
            }
            None if persisted => {
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove {}: {e}", path.display());
                }
            }
            None => {}
        }
    }
}

/// Atomically write several files: either every file lands or none does.
///
/// All files are staged first. Each existing target is moved to a backup
/// before its rename; if any step fails, earlier targets are restored from
/// their backups (or removed when they did not exist before).
pub fn write_all_atomic(files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, bytes) in files {
        staged.push((path, stage(path, bytes)?));
    }

    let mut done: Vec<(&PathBuf, Option<TempPath>, bool)> = Vec::with_capacity(files.len());
    for (path, temp) in staged {
        let backup = match back_up(path) {
            Ok(backup) => backup,
            Err(e) => {
                roll_back(done);
                return Err(e);
            }
        };
        if let Err(e) = temp.persist(path) {
            done.push((path, backup, false));
            roll_back(done);
            return Err(PokembedError::Io(e.error));
        }
        done.push((path, backup, true));
    }

    // dropping the backups deletes the previous contents
    drop(done);
    debug!("Wrote {} files atomically", files.len());
    Ok(())
}
