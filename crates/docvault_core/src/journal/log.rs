//! Journal-backed revision log.

use super::record::{self, Decoded};
use crate::error::{CoreError, CoreResult};
use crate::revision::{CommitRequest, Revision, RevisionLog, MIN_HANDLE_PREFIX};
use docvault_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::RwLock;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// A [`RevisionLog`] that appends framed records to a storage backend.
///
/// Revision metadata is replayed into memory on open; the document content
/// itself is never stored here, only its digest.
///
/// # Recovery
///
/// - An incomplete trailing record (interrupted append) is truncated away,
///   provided nothing that looks like another record follows it.
/// - A checksum failure, bad magic, broken parent chain or tampered handle
///   anywhere in the journal is reported as corruption.
pub struct JournalLog {
    inner: RwLock<Inner>,
}

struct Inner {
    backend: Box<dyn StorageBackend>,
    revisions: Vec<Revision>,
    sync_on_commit: bool,
}

impl JournalLog {
    /// Opens a journal on `backend`, replaying and verifying its records.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corruption`] if the journal cannot be trusted.
    pub fn open(mut backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> CoreResult<Self> {
        let data = backend.read_all()?;
        let (revisions, valid_len) = replay(&data)?;

        if valid_len < data.len() {
            warn!(
                discarded = data.len() - valid_len,
                offset = valid_len,
                "truncating torn journal tail"
            );
            backend.truncate(valid_len as u64)?;
        }

        debug!(revisions = revisions.len(), "journal replayed");

        Ok(Self {
            inner: RwLock::new(Inner {
                backend,
                revisions,
                sync_on_commit,
            }),
        })
    }

    /// Opens (or creates) a journal file.
    pub fn open_file(path: &Path, sync_on_commit: bool) -> CoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Self::open(Box::new(backend), sync_on_commit)
    }

    /// Creates an empty journal that lives in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner {
                backend: Box::new(InMemoryBackend::new()),
                revisions: Vec::new(),
                sync_on_commit: false,
            }),
        }
    }
}

/// Decodes every complete record and checks the chain.
///
/// Returns the revisions and the length of the valid prefix.
fn replay(data: &[u8]) -> CoreResult<(Vec<Revision>, usize)> {
    let mut revisions: Vec<Revision> = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (revision, len) = match record::decode_at(data, offset)? {
            Decoded::Record { revision, len } => (revision, len),
            Decoded::Torn => {
                // A torn append is always the last thing in the file. A later
                // record means this one's header is damaged, not unfinished.
                if let Some(next) = record::find_magic(&data[offset + 1..]) {
                    return Err(CoreError::corruption(format!(
                        "journal record at offset {offset} is cut short by another record at offset {}",
                        offset + 1 + next
                    )));
                }
                break;
            }
        };

        let previous = revisions.last();
        let expected_sequence = previous.map_or(1, |rev| rev.sequence + 1);
        if revision.sequence != expected_sequence {
            return Err(CoreError::corruption(format!(
                "journal sequence gap at offset {offset}: expected {expected_sequence}, found {}",
                revision.sequence
            )));
        }
        if revision.parent.as_ref() != previous.map(|rev| &rev.handle) {
            return Err(CoreError::corruption(format!(
                "revision {} does not follow the previous head",
                revision.handle.short()
            )));
        }
        if !revision.is_sealed() {
            return Err(CoreError::corruption(format!(
                "revision {} does not match its handle",
                revision.handle.short()
            )));
        }

        revisions.push(revision);
        offset += len;
    }

    Ok((revisions, offset))
}

impl Inner {
    fn append_durably(&mut self, data: &[u8]) -> CoreResult<()> {
        self.backend.append(data)?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }
}

impl RevisionLog for JournalLog {
    fn commit(&self, request: &CommitRequest) -> CoreResult<Revision> {
        let mut inner = self.inner.write();

        let revision = Revision::new(inner.revisions.last(), request);
        let data = record::encode(&revision)?;
        let offset = inner
            .backend
            .size()
            .map_err(|e| CoreError::commit(format!("cannot size journal: {e}")))?;

        if let Err(err) = inner.append_durably(&data) {
            if let Err(truncate_err) = inner.backend.truncate(offset) {
                error!(
                    %truncate_err,
                    offset,
                    "failed to discard partial journal record; it will be dropped on reopen"
                );
            }
            return Err(CoreError::commit(format!("journal append failed: {err}")));
        }

        info!(
            revision = revision.handle.short(),
            sequence = revision.sequence,
            author = %revision.author,
            "committed revision"
        );
        inner.revisions.push(revision.clone());
        Ok(revision)
    }

    fn head(&self) -> Option<Revision> {
        self.inner.read().revisions.last().cloned()
    }

    fn history(&self, limit: usize) -> Vec<Revision> {
        self.inner
            .read()
            .revisions
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    fn get(&self, handle: &str) -> CoreResult<Option<Revision>> {
        if handle.len() < MIN_HANDLE_PREFIX {
            return Ok(None);
        }
        let inner = self.inner.read();
        let mut matches = inner
            .revisions
            .iter()
            .filter(|rev| rev.handle.matches_prefix(handle));

        let found = matches.next().cloned();
        if matches.next().is_some() {
            return Err(CoreError::AmbiguousHandle {
                prefix: handle.to_string(),
            });
        }
        Ok(found)
    }

    fn len(&self) -> usize {
        self.inner.read().revisions.len()
    }
}

impl std::fmt::Debug for JournalLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("JournalLog")
            .field("revisions", &inner.revisions.len())
            .field("sync_on_commit", &inner.sync_on_commit)
            .finish_non_exhaustive()
    }
}
