//! Append-only revision journal.
//!
//! The journal is the embedded [`RevisionLog`](crate::RevisionLog)
//! implementation. Each commit appends one framed, checksummed record to a
//! [`StorageBackend`](docvault_storage::StorageBackend); opening the journal
//! replays every record and verifies the chain.

mod log;
mod record;

pub use log::JournalLog;
pub use record::{RECORD_MAGIC, RECORD_VERSION};
