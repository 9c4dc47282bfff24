//! Atomic whole-file replacement.
//!
//! [`replace_file`] uses the write-then-rename pattern:
//! 1. Write the new bytes to a sibling temp file
//! 2. Fsync the temp file
//! 3. Rename it over the target
//! 4. Fsync the parent directory so the rename itself is durable
//!
//! Rename is atomic within a filesystem, so concurrent readers that open the
//! target see either the old inode or the new one.

use crate::error::{StorageError, StorageResult};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

/// Suffix appended to the target file name for the staging file.
const TEMP_SUFFIX: &str = ".tmp";

/// Returns the staging path used while replacing `path`.
pub fn temp_path(path: &Path) -> StorageResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| StorageError::InvalidPath(path.to_path_buf()))?;
    let mut temp_name = OsString::from(file_name);
    temp_name.push(TEMP_SUFFIX);
    Ok(path.with_file_name(temp_name))
}

/// Atomically replaces the content of `path` with `data`.
///
/// The parent directory must exist. A stale temp file from an interrupted
/// earlier attempt is overwritten.
pub fn replace_file(path: &Path, data: &[u8]) -> StorageResult<()> {
    let temp = temp_path(path)?;

    let mut file = File::create(&temp)?;
    let written = file.write_all(data).and_then(|()| file.sync_all());
    drop(file);
    if let Err(err) = written {
        discard_temp(&temp);
        return Err(err.into());
    }

    if let Err(err) = fs::rename(&temp, path) {
        discard_temp(&temp);
        return Err(err.into());
    }

    sync_parent(path)?;
    trace!(path = %path.display(), bytes = data.len(), "replaced file");
    Ok(())
}

/// Best-effort removal of a staging file after a failed replacement.
fn discard_temp(temp: &Path) {
    if let Err(err) = fs::remove_file(temp) {
        warn!(path = %temp.display(), %err, "failed to remove staging file");
    }
}

/// Removes `path` durably. Returns `false` if it did not exist.
pub fn remove_file(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            sync_parent(path)?;
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Reads `path`, returning `None` if it does not exist.
pub fn read_file(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Fsyncs the directory containing `path`.
#[cfg(unix)]
pub fn sync_parent(path: &Path) -> StorageResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    File::open(parent)?.sync_all()?;
    Ok(())
}

/// Directory fsync is not available on this platform; NTFS journals
/// metadata updates itself.
#[cfg(not(unix))]
pub fn sync_parent(_path: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replace_creates_then_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.json");

        replace_file(&path, b"{\"a\":1}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{\"a\":1}");

        replace_file(&path, b"[]").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"[]");
        assert!(!temp_path(&path).unwrap().exists());
    }

    #[test]
    fn stale_temp_file_is_overwritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.json");
        fs::write(temp_path(&path).unwrap(), b"half-writ").unwrap();

        replace_file(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn replace_into_missing_directory_fails_cleanly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("backup.json");

        assert!(replace_file(&path, b"{}").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn failed_rename_removes_the_staging_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        assert!(replace_file(&path, b"{}").is_err());
        assert!(!temp_path(&path).unwrap().exists());
        assert!(path.join("occupied").exists());
    }

    #[test]
    fn read_missing_is_none() {
        let dir = tempdir().unwrap();
        assert!(read_file(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn remove_reports_existence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("backup.json");
        replace_file(&path, b"{}").unwrap();

        assert!(remove_file(&path).unwrap());
        assert!(!remove_file(&path).unwrap());
    }

    #[test]
    fn temp_path_is_sibling() {
        let path = Path::new("/srv/vault/backup.json");
        assert_eq!(
            temp_path(path).unwrap(),
            PathBuf::from("/srv/vault/backup.json.tmp")
        );
        assert!(temp_path(Path::new("/")).is_err());
    }
}
