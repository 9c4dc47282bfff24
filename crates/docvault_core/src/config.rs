//! Vault configuration.

use crate::error::{CoreError, CoreResult};
use std::time::Duration;

/// Default branch (line of history) to commit onto.
pub const DEFAULT_BRANCH: &str = "main";

/// Default file name of the working document inside the vault root.
pub const DEFAULT_DOCUMENT_FILE: &str = "backup.json";

/// What a save does when another save holds the write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPolicy {
    /// Wait up to `timeout`, then fail with [`CoreError::Timeout`].
    Block {
        /// Longest time to wait for the lock.
        timeout: Duration,
    },
    /// Fail immediately with [`CoreError::Busy`].
    FailFast,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::Block {
            timeout: Duration::from_secs(5),
        }
    }
}

/// What `load()` returns before the first save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingPolicy {
    /// Return an empty JSON object.
    #[default]
    EmptyObject,
    /// Fail with a not-found error.
    NotFound,
}

/// Configuration for opening a vault.
#[derive(Debug, Clone)]
pub struct Config {
    /// Line of history to commit onto. Each branch has its own journal.
    pub branch: String,

    /// File name of the working document, relative to the vault root.
    pub document_file: String,

    /// Largest accepted document, in bytes of request body.
    pub max_document_size: usize,

    /// Contention policy for concurrent saves.
    pub lock_policy: LockPolicy,

    /// Behaviour of `load()` before the first save.
    pub missing_policy: MissingPolicy,

    /// Author label used when a save does not name one.
    pub default_author: String,

    /// Whether to fsync the journal on every commit.
    pub sync_on_commit: bool,

    /// Whether to create the vault directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether opening reconciles the working document with the journal,
    /// rolling back an interrupted save. Read-only tools turn this off.
    pub recover_on_open: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            document_file: DEFAULT_DOCUMENT_FILE.to_string(),
            max_document_size: 16 * 1024 * 1024, // 16 MiB
            lock_policy: LockPolicy::default(),
            missing_policy: MissingPolicy::default(),
            default_author: "unknown".to_string(),
            sync_on_commit: true,
            create_if_missing: true,
            recover_on_open: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the branch to commit onto.
    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Sets the working document's file name.
    #[must_use]
    pub fn document_file(mut self, name: impl Into<String>) -> Self {
        self.document_file = name.into();
        self
    }

    /// Sets the maximum document size in bytes.
    #[must_use]
    pub const fn max_document_size(mut self, size: usize) -> Self {
        self.max_document_size = size;
        self
    }

    /// Sets the contention policy.
    #[must_use]
    pub const fn lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Sets the missing-document policy.
    #[must_use]
    pub const fn missing_policy(mut self, policy: MissingPolicy) -> Self {
        self.missing_policy = policy;
        self
    }

    /// Sets the default author label.
    #[must_use]
    pub fn default_author(mut self, author: impl Into<String>) -> Self {
        self.default_author = author.into();
        self
    }

    /// Sets whether to fsync the journal on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets whether to create the vault directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether opening reconciles the working document with the journal.
    #[must_use]
    pub const fn recover_on_open(mut self, value: bool) -> Self {
        self.recover_on_open = value;
        self
    }

    /// Checks that names used as file names are safe and limits are sane.
    pub fn validate(&self) -> CoreResult<()> {
        check_file_name("branch", &self.branch)?;
        check_file_name("document file", &self.document_file)?;
        if self.max_document_size == 0 {
            return Err(CoreError::invalid_config(
                "max document size must be greater than zero",
            ));
        }
        if self.default_author.trim().is_empty() {
            return Err(CoreError::invalid_config("default author must not be empty"));
        }
        Ok(())
    }
}

fn check_file_name(what: &str, name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CoreError::invalid_config(format!(
            "{what} '{name}' must be non-empty, must not start with '.', and may only contain ASCII letters, digits, '-', '_' or '.'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.branch, "main");
        assert_eq!(config.document_file, "backup.json");
        assert_eq!(
            config.lock_policy,
            LockPolicy::Block {
                timeout: Duration::from_secs(5)
            }
        );
        assert_eq!(config.missing_policy, MissingPolicy::EmptyObject);
        assert!(config.sync_on_commit);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .branch("backups")
            .lock_policy(LockPolicy::FailFast)
            .missing_policy(MissingPolicy::NotFound)
            .max_document_size(1024)
            .sync_on_commit(false);

        assert_eq!(config.branch, "backups");
        assert_eq!(config.lock_policy, LockPolicy::FailFast);
        assert_eq!(config.max_document_size, 1024);
        assert!(!config.sync_on_commit);
    }

    #[test]
    fn rejects_path_like_branch() {
        for bad in ["", "../main", ".hidden", "feature/x", "a b"] {
            let config = Config::new().branch(bad);
            assert!(config.validate().is_err(), "branch {bad:?} accepted");
        }
        assert!(Config::new().branch("release-1.2_x").validate().is_ok());
    }

    #[test]
    fn rejects_zero_size_limit() {
        assert!(Config::new().max_document_size(0).validate().is_err());
    }
}
