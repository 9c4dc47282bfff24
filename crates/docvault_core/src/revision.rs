//! Revisions and the revision log interface.

use crate::error::CoreResult;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Write as _};

/// Prefix of every generated commit message.
pub const MESSAGE_TAG: &str = "[docvault]";

/// Shortest handle prefix accepted for lookups.
pub const MIN_HANDLE_PREFIX: usize = 4;

/// Length of the abbreviated handle shown to humans.
const SHORT_HANDLE_LEN: usize = 12;

fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// SHA-256 of the document bytes a revision tags (lowercase hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Computes the digest of `content`.
    #[must_use]
    pub fn of(content: &[u8]) -> Self {
        Self(sha256_hex(content))
    }

    /// Returns the hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a revision (lowercase hex SHA-256 of its header).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionHandle(String);

impl RevisionHandle {
    /// Returns the full hex string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the abbreviated form used in logs and listings.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(SHORT_HANDLE_LEN)]
    }

    /// Returns true if `prefix` abbreviates this handle.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        prefix.len() >= MIN_HANDLE_PREFIX && self.0.starts_with(&prefix.to_ascii_lowercase())
    }
}

impl fmt::Display for RevisionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the caller asks the log to record.
#[derive(Debug, Clone)]
pub struct CommitRequest {
    /// Digest of the document that was just written.
    pub content_digest: ContentDigest,
    /// Author label.
    pub author: String,
    /// Commit message.
    pub message: String,
    /// Commit time, truncated to microseconds.
    pub timestamp: DateTime<Utc>,
}

impl CommitRequest {
    /// Builds the request for a regular save, stamped now.
    #[must_use]
    pub fn for_save(content: &[u8], author: &str) -> Self {
        let timestamp = now();
        Self {
            content_digest: ContentDigest::of(content),
            author: author.to_string(),
            message: save_message(author, timestamp),
            timestamp,
        }
    }

    /// Builds the request that adopts a document placed by hand in a vault
    /// that has no history yet.
    #[must_use]
    pub fn for_recovery(content: &[u8]) -> Self {
        let timestamp = now();
        Self {
            content_digest: ContentDigest::of(content),
            author: "docvault".to_string(),
            message: format!(
                "{MESSAGE_TAG} adopt existing working copy at {}",
                timestamp.format("%Y-%m-%d %H:%M:%S")
            ),
            timestamp,
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// The deterministic message of a save commit.
#[must_use]
pub fn save_message(author: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "{MESSAGE_TAG} update backup by {author} at {}",
        timestamp.format("%Y-%m-%d %H:%M:%S")
    )
}

/// An immutable history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Identifier derived from every other field.
    pub handle: RevisionHandle,
    /// Previous head; `None` only for the first revision.
    pub parent: Option<RevisionHandle>,
    /// Position in the line of history, starting at 1.
    pub sequence: u64,
    /// Commit time.
    pub timestamp: DateTime<Utc>,
    /// Author label.
    pub author: String,
    /// Commit message.
    pub message: String,
    /// Digest of the document this revision tags.
    pub content_digest: ContentDigest,
}

impl Revision {
    /// Creates the revision that follows `parent`.
    #[must_use]
    pub fn new(parent: Option<&Revision>, request: &CommitRequest) -> Self {
        let parent_handle = parent.map(|rev| rev.handle.clone());
        let sequence = parent.map_or(1, |rev| rev.sequence + 1);
        let handle = Self::compute_handle(
            parent_handle.as_ref(),
            sequence,
            request.timestamp,
            &request.author,
            &request.message,
            &request.content_digest,
        );
        Self {
            handle,
            parent: parent_handle,
            sequence,
            timestamp: request.timestamp,
            author: request.author.clone(),
            message: request.message.clone(),
            content_digest: request.content_digest.clone(),
        }
    }

    fn compute_handle(
        parent: Option<&RevisionHandle>,
        sequence: u64,
        timestamp: DateTime<Utc>,
        author: &str,
        message: &str,
        digest: &ContentDigest,
    ) -> RevisionHandle {
        let header = format!(
            "parent {}\nsequence {sequence}\ncontent {digest}\ntime {}\nauthor {author}\n\n{message}",
            parent.map_or("-", RevisionHandle::as_str),
            timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        RevisionHandle(sha256_hex(header.as_bytes()))
    }

    /// Returns true if the handle matches the other fields.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.handle
            == Self::compute_handle(
                self.parent.as_ref(),
                self.sequence,
                self.timestamp,
                &self.author,
                &self.message,
                &self.content_digest,
            )
    }

    /// Returns true if this revision tags exactly `content`.
    #[must_use]
    pub fn tags(&self, content: &[u8]) -> bool {
        self.content_digest == ContentDigest::of(content)
    }
}

/// Linear, append-only history of the working document.
///
/// Implementations record that a document became the new head; they never
/// store document content. Every method takes `&self`; implementations use
/// interior locking and must be `Send + Sync`.
pub trait RevisionLog: Send + Sync {
    /// Records a new head whose parent is the current head.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Commit`](crate::CoreError::Commit) if the record
    /// could not be made durable. The log is unchanged in that case.
    fn commit(&self, request: &CommitRequest) -> CoreResult<Revision>;

    /// Returns the latest revision, or `None` if history is empty.
    fn head(&self) -> Option<Revision>;

    /// Returns up to `limit` revisions, newest first.
    fn history(&self, limit: usize) -> Vec<Revision>;

    /// Looks up a revision by full handle or unambiguous prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AmbiguousHandle`](crate::CoreError::AmbiguousHandle)
    /// if the prefix matches several revisions.
    fn get(&self, handle: &str) -> CoreResult<Option<Revision>>;

    /// Returns the number of revisions.
    fn len(&self) -> usize;

    /// Returns true if history is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
