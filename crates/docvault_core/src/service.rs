//! The backup service façade.

use crate::config::{Config, LockPolicy, MissingPolicy};
use crate::dir::VaultDir;
use crate::document::{Document, DocumentStore};
use crate::error::{CoreError, CoreResult};
use crate::journal::JournalLog;
use crate::revision::{CommitRequest, ContentDigest, Revision, RevisionLog};
use crate::serializer::{SaveState, WriteSerializer};
use docvault_storage::{atomic, InMemoryBackend};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Stable error kinds exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The candidate document was rejected; nothing changed.
    InvalidInput,
    /// No document (or revision) exists.
    NotFound,
    /// On-disk state is unreadable and needs an operator.
    Corrupted,
    /// Another save holds the lock (fail-fast policy).
    Busy,
    /// The lock wait ran out.
    TimedOut,
    /// History could not be recorded; the document was rolled back.
    CommitFailed,
    /// Any other storage fault.
    Internal,
}

impl ErrorKind {
    /// Returns the snake_case name used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Corrupted => "corrupted",
            Self::Busy => "busy",
            Self::TimedOut => "timed_out",
            Self::CommitFailed => "commit_failed",
            Self::Internal => "internal",
        }
    }

    /// Returns true if repeating the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Busy | Self::TimedOut | Self::CommitFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error returned by [`BackupService`] operations.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    kind: ErrorKind,
    message: String,
}

impl ServiceError {
    /// Creates an error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        let kind = match &err {
            CoreError::Validation { .. } | CoreError::AmbiguousHandle { .. } => {
                ErrorKind::InvalidInput
            }
            CoreError::NotFound | CoreError::RevisionNotFound { .. } => ErrorKind::NotFound,
            CoreError::Corruption { .. } => ErrorKind::Corrupted,
            CoreError::Busy => ErrorKind::Busy,
            CoreError::Timeout { .. } => ErrorKind::TimedOut,
            CoreError::Commit { .. } => ErrorKind::CommitFailed,
            CoreError::Storage(_)
            | CoreError::Io(_)
            | CoreError::DirectoryLocked { .. }
            | CoreError::InvalidConfig { .. } => ErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

/// Snapshot of the vault for health checks and tooling.
#[derive(Debug, Clone)]
pub struct VaultStatus {
    /// Vault root.
    pub root: PathBuf,
    /// Line of history in use.
    pub branch: String,
    /// Path of the working document.
    pub document_path: PathBuf,
    /// Whether a working document exists.
    pub document_exists: bool,
    /// Latest revision.
    pub head: Option<Revision>,
    /// Number of revisions on the branch.
    pub revisions: usize,
    /// Whether a save currently holds the write lock.
    pub write_in_progress: bool,
    /// What a save does while another save holds the lock.
    pub lock_policy: LockPolicy,
}

/// Result of [`BackupService::verify`].
#[derive(Debug, Clone)]
pub struct VerifyReport {
    /// Number of revisions replayed.
    pub revisions: usize,
    /// Digest of the working document, if one exists.
    pub working_digest: Option<ContentDigest>,
    /// Whether the working document is what head tags.
    pub head_matches_working: bool,
}

/// Façade over the document store, revision log and write serializer.
///
/// A service owns one vault directory (and its process lock). All state is
/// held by the instance, so independent vaults can be served side by side.
///
/// # Example
///
/// ```no_run
/// use docvault_core::{BackupService, Config};
/// use std::path::Path;
///
/// let service = BackupService::open(Path::new("vault"), Config::default())?;
/// let revision = service.save(br#"{"items":[]}"#)?;
/// assert_eq!(service.load()?.value()["items"], serde_json::json!([]));
/// println!("saved {}", revision.handle.short());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct BackupService {
    dir: VaultDir,
    store: DocumentStore,
    log: Box<dyn RevisionLog>,
    serializer: WriteSerializer,
    config: Config,
    read_only: bool,
}

impl BackupService {
    /// Opens the vault at `root` with the journal for `config.branch`.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, a vault locked by another process,
    /// or a corrupted journal.
    pub fn open(root: &Path, config: Config) -> CoreResult<Self> {
        config.validate()?;
        let dir = VaultDir::open(root, &config)?;
        let log = JournalLog::open_file(&dir.journal_path(&config.branch), config.sync_on_commit)?;
        Self::assemble(dir, Box::new(log), config, false)
    }

    /// Opens the vault at `root` with a caller-supplied revision log.
    pub fn with_log(root: &Path, config: Config, log: Box<dyn RevisionLog>) -> CoreResult<Self> {
        config.validate()?;
        let dir = VaultDir::open(root, &config)?;
        Self::assemble(dir, log, config, false)
    }

    /// Opens an existing vault for inspection without modifying it.
    ///
    /// The journal is replayed from an in-memory copy, so a torn tail is
    /// skipped but left on disk, and no recovery is attempted.
    /// Saves are refused.
    pub fn open_read_only(root: &Path, config: Config) -> CoreResult<Self> {
        let config = config.create_if_missing(false).recover_on_open(false);
        config.validate()?;
        let dir = VaultDir::open(root, &config)?;
        let journal = atomic::read_file(&dir.journal_path(&config.branch))?.unwrap_or_default();
        let log = JournalLog::open(Box::new(InMemoryBackend::with_data(journal)), false)?;
        Self::assemble(dir, Box::new(log), config, true)
    }

    fn assemble(
        dir: VaultDir,
        log: Box<dyn RevisionLog>,
        config: Config,
        read_only: bool,
    ) -> CoreResult<Self> {
        let store = DocumentStore::new(
            dir.document_path(),
            dir.preimage_path(),
            config.max_document_size,
        );
        let serializer = WriteSerializer::new(config.lock_policy);
        let service = Self {
            dir,
            store,
            log,
            serializer,
            config,
            read_only,
        };

        if service.config.recover_on_open {
            service.reconcile()?;
        }

        info!(
            root = %service.dir.root().display(),
            branch = %service.config.branch,
            revisions = service.log.len(),
            "vault opened"
        );
        Ok(service)
    }

    /// Brings the working document in line with history.
    ///
    /// A save interrupted between replacing the file and appending the
    /// journal record leaves a pre-image behind; the working document is
    /// rolled back to it. A valid document placed in a vault with no
    /// history is adopted with a recovery revision. Anything else is left
    /// for the operator.
    fn reconcile(&self) -> CoreResult<()> {
        let staged = self.store.staged_preimage()?;
        let working = self.store.read_raw()?;
        let head = self.log.head();

        let in_sync = match (&head, &working) {
            (Some(head), Some(bytes)) => head.tags(bytes),
            (None, None) => true,
            _ => false,
        };

        if let Some(previous) = staged {
            if !in_sync {
                self.store.restore(previous.as_deref())?;
                warn!(
                    head = ?head.as_ref().map(|head| head.handle.short()),
                    "rolled back a save that did not reach history"
                );
            }
            self.store.clear_preimage()?;
            return Ok(());
        }

        if in_sync {
            return Ok(());
        }

        let Some(bytes) = working else {
            if let Some(head) = head {
                warn!(
                    head = head.handle.short(),
                    "working document is missing although history exists"
                );
            }
            return Ok(());
        };

        if let Some(head) = head {
            warn!(
                head = head.handle.short(),
                "working document differs from head; leaving it for the operator"
            );
            return Ok(());
        }

        if let Err(err) = self.store.read() {
            error!(%err, "working document is unreadable; leaving it for the operator");
            return Ok(());
        }

        let revision = self.log.commit(&CommitRequest::for_recovery(&bytes))?;
        warn!(
            revision = revision.handle.short(),
            "adopted working document that history did not record"
        );
        Ok(())
    }

    /// Returns the current document.
    ///
    /// Before the first save this is `{}` or a not-found error, depending on
    /// [`MissingPolicy`].
    pub fn load(&self) -> ServiceResult<Document> {
        match self.store.read() {
            Ok(document) => Ok(document),
            Err(CoreError::NotFound) if self.config.missing_policy == MissingPolicy::EmptyObject => {
                Ok(Document::empty())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Saves `candidate` under the default author.
    pub fn save(&self, candidate: &[u8]) -> ServiceResult<Revision> {
        let author = self.config.default_author.clone();
        self.save_as(candidate, &author)
    }

    /// Saves `candidate` under `author`, returning the new head.
    ///
    /// Validation, the file replacement and the journal append all happen
    /// inside one exclusive write scope. If the replacement or the journal
    /// append fails, the previous working document is restored before the
    /// lock is released. The pre-image staged before the replacement lets a
    /// later open do the same after a crash.
    pub fn save_as(&self, candidate: &[u8], author: &str) -> ServiceResult<Revision> {
        if self.read_only {
            return Err(ServiceError::new(
                ErrorKind::Internal,
                "vault was opened read-only",
            ));
        }
        let author = match author.trim() {
            "" => self.config.default_author.as_str(),
            trimmed => trimmed,
        };

        let result = self.serializer.with_exclusive_write(|scope| {
            scope.advance(SaveState::Validating);
            let document = self.store.validate(candidate)?;

            scope.advance(SaveState::Writing);
            let previous = self.store.read_raw()?;
            self.store.stage_preimage(previous.as_deref())?;

            let committed = self.store.write_document(&document).and_then(|written| {
                scope.advance(SaveState::Committing);
                self.log.commit(&CommitRequest::for_save(&written, author))
            });

            match committed {
                Ok(revision) => {
                    scope.advance(SaveState::Committed);
                    self.discard_preimage();
                    Ok(revision)
                }
                Err(err) => {
                    warn!(attempt = scope.attempt(), %err, "save failed, restoring previous document");
                    if let Err(restore_err) = self.store.restore(previous.as_deref()) {
                        error!(%restore_err, "rollback of working document failed");
                        return Err(CoreError::corruption(format!(
                            "{err}; restoring the previous document also failed: {restore_err}"
                        )));
                    }
                    self.discard_preimage();
                    scope.advance(SaveState::RolledBack);
                    Err(err)
                }
            }
        });

        result.map_err(ServiceError::from)
    }

    /// Removes the pre-image of a finished save. A leftover one is harmless:
    /// the next open sees that head tags the working document and drops it.
    fn discard_preimage(&self) {
        if let Err(err) = self.store.clear_preimage() {
            warn!(%err, "failed to remove save pre-image");
        }
    }

    /// Returns the latest revision.
    #[must_use]
    pub fn head(&self) -> Option<Revision> {
        self.log.head()
    }

    /// Returns up to `limit` revisions, newest first.
    #[must_use]
    pub fn history(&self, limit: usize) -> Vec<Revision> {
        self.log.history(limit)
    }

    /// Looks up a revision by handle or unambiguous prefix.
    pub fn revision(&self, handle: &str) -> ServiceResult<Revision> {
        self.log
            .get(handle)?
            .ok_or_else(|| {
                CoreError::RevisionNotFound {
                    handle: handle.to_string(),
                }
                .into()
            })
    }

    /// Returns a status snapshot.
    #[must_use]
    pub fn status(&self) -> VaultStatus {
        VaultStatus {
            root: self.dir.root().to_path_buf(),
            branch: self.config.branch.clone(),
            document_path: self.store.path().to_path_buf(),
            document_exists: self.store.exists(),
            head: self.log.head(),
            revisions: self.log.len(),
            write_in_progress: self.serializer.is_locked(),
            lock_policy: self.serializer.policy(),
        }
    }

    /// Checks that head tags the working document.
    ///
    /// Journal integrity itself is verified when the log is opened.
    pub fn verify(&self) -> ServiceResult<VerifyReport> {
        let working = self.store.read_raw().map_err(ServiceError::from)?;
        let working_digest = working.as_deref().map(ContentDigest::of);
        let head_matches_working = match (self.log.head(), &working_digest) {
            (Some(head), Some(digest)) => head.content_digest == *digest,
            (None, None) => true,
            _ => false,
        };
        Ok(VerifyReport {
            revisions: self.log.len(),
            working_digest,
            head_matches_working,
        })
    }

    /// Lists the branches that have a journal in this vault.
    pub fn branches(&self) -> ServiceResult<Vec<String>> {
        Ok(self.dir.branches()?)
    }

    /// Returns the configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl fmt::Debug for BackupService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupService")
            .field("root", &self.dir.root())
            .field("branch", &self.config.branch)
            .field("revisions", &self.log.len())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
