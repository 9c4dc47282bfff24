//! Vault directory management.
//!
//! This module handles the file system layout of a vault:
//!
//! ```text
//! <vault_root>/
//! ├─ backup.json             # Working document (name configurable)
//! └─ .docvault/
//!    ├─ LOCK                 # Advisory lock for single-process ownership
//!    ├─ backup.json.prev     # Pre-image of a save in flight
//!    └─ history/
//!       └─ <branch>.log      # Revision journal, one per line of history
//! ```
//!
//! The LOCK file ensures only one process serves a vault at a time. Within
//! that process, saves are serialized by the
//! [`WriteSerializer`](crate::WriteSerializer).

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the metadata directory inside the vault root.
const META_DIR: &str = ".docvault";
const LOCK_FILE: &str = "LOCK";
const HISTORY_DIR: &str = "history";
const JOURNAL_EXTENSION: &str = "log";
const PREIMAGE_EXTENSION: &str = "prev";

/// An opened vault directory holding the exclusive process lock.
///
/// The lock is released when the value is dropped.
#[derive(Debug)]
pub struct VaultDir {
    root: PathBuf,
    document_file: String,
    _lock_file: File,
}

impl VaultDir {
    /// Opens (and optionally creates) a vault directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidConfig`] if the root or its `.docvault/`
    ///   metadata is missing and `create_if_missing` is false, or if the root
    ///   is not a directory
    /// - [`CoreError::DirectoryLocked`] if another process holds the lock
    pub fn open(root: &Path, config: &Config) -> CoreResult<Self> {
        if !root.exists() {
            if config.create_if_missing {
                fs::create_dir_all(root)?;
            } else {
                return Err(CoreError::invalid_config(format!(
                    "vault directory does not exist: {}",
                    root.display()
                )));
            }
        }

        if !root.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "vault path is not a directory: {}",
                root.display()
            )));
        }

        let meta = root.join(META_DIR);
        if config.create_if_missing {
            fs::create_dir_all(meta.join(HISTORY_DIR))?;
        } else if !meta.is_dir() {
            return Err(CoreError::invalid_config(format!(
                "not a vault (no {META_DIR} directory): {}",
                root.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(meta.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DirectoryLocked {
                path: root.to_path_buf(),
            });
        }

        debug!(root = %root.display(), "acquired vault lock");

        Ok(Self {
            root: root.to_path_buf(),
            document_file: config.document_file.clone(),
            _lock_file: lock_file,
        })
    }

    /// Returns the vault root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of the working document.
    #[must_use]
    pub fn document_path(&self) -> PathBuf {
        self.root.join(&self.document_file)
    }

    /// Returns where a save records the state it is about to replace.
    #[must_use]
    pub fn preimage_path(&self) -> PathBuf {
        self.root
            .join(META_DIR)
            .join(format!("{}.{PREIMAGE_EXTENSION}", self.document_file))
    }

    /// Returns the directory holding the journals.
    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        self.root.join(META_DIR).join(HISTORY_DIR)
    }

    /// Returns the journal path for `branch`.
    #[must_use]
    pub fn journal_path(&self, branch: &str) -> PathBuf {
        self.history_dir()
            .join(format!("{branch}.{JOURNAL_EXTENSION}"))
    }

    /// Lists the branches that have a journal, sorted by name.
    pub fn branches(&self) -> CoreResult<Vec<String>> {
        let mut branches = Vec::new();
        for entry in fs::read_dir(self.history_dir())? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(JOURNAL_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                branches.push(stem.to_string());
            }
        }
        branches.sort();
        Ok(branches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_layout() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("vault");

        let dir = VaultDir::open(&root, &Config::default()).unwrap();
        assert!(root.is_dir());
        assert!(dir.history_dir().is_dir());
        assert!(root.join(".docvault").join("LOCK").exists());
    }

    #[test]
    fn open_fails_if_missing_and_no_create() {
        let temp = tempdir().unwrap();
        let config = Config::default().create_if_missing(false);

        let result = VaultDir::open(&temp.path().join("absent"), &config);
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn open_without_create_requires_existing_metadata() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), b"x").unwrap();
        let config = Config::default().create_if_missing(false);

        let result = VaultDir::open(temp.path(), &config);
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
        assert!(!temp.path().join(".docvault").exists());

        drop(VaultDir::open(temp.path(), &Config::default()).unwrap());
        assert!(VaultDir::open(temp.path(), &config).is_ok());
    }

    #[test]
    fn open_fails_on_regular_file() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("not-a-dir");
        fs::write(&file, b"x").unwrap();

        let result = VaultDir::open(&file, &Config::default());
        assert!(matches!(result, Err(CoreError::InvalidConfig { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _first = VaultDir::open(temp.path(), &Config::default()).unwrap();

        let second = VaultDir::open(temp.path(), &Config::default());
        assert!(matches!(second, Err(CoreError::DirectoryLocked { .. })));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _dir = VaultDir::open(temp.path(), &Config::default()).unwrap();
        }
        assert!(VaultDir::open(temp.path(), &Config::default()).is_ok());
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let config = Config::default().document_file("todo.json");
        let dir = VaultDir::open(temp.path(), &config).unwrap();

        assert_eq!(dir.root(), temp.path());
        assert_eq!(dir.document_path(), temp.path().join("todo.json"));
        assert_eq!(
            dir.journal_path("main"),
            temp.path().join(".docvault").join("history").join("main.log")
        );
        assert_eq!(
            dir.preimage_path(),
            temp.path().join(".docvault").join("todo.json.prev")
        );
    }

    #[test]
    fn branches_lists_journals() {
        let temp = tempdir().unwrap();
        let dir = VaultDir::open(temp.path(), &Config::default()).unwrap();
        fs::write(dir.journal_path("main"), b"").unwrap();
        fs::write(dir.journal_path("archive"), b"").unwrap();
        fs::write(dir.history_dir().join("notes.txt"), b"").unwrap();

        assert_eq!(dir.branches().unwrap(), vec!["archive", "main"]);
    }
}
