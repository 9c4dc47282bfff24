//! # docvault core
//!
//! Versioned persistence for a single JSON backup document.
//!
//! This crate provides:
//! - [`DocumentStore`] for validated, atomically replaced document files
//! - [`RevisionLog`] and its journal implementation [`JournalLog`]
//! - [`WriteSerializer`] for one-at-a-time save transactions
//! - [`BackupService`], the façade that ties them together
//!
//! Every successful save replaces the working document and appends exactly
//! one revision. A save that fails leaves both untouched.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod document;
mod error;
mod journal;
mod revision;
mod serializer;
mod service;

pub use config::{Config, LockPolicy, MissingPolicy, DEFAULT_BRANCH, DEFAULT_DOCUMENT_FILE};
pub use dir::VaultDir;
pub use document::{Document, DocumentStore};
pub use error::{CoreError, CoreResult};
pub use journal::{JournalLog, RECORD_MAGIC, RECORD_VERSION};
pub use revision::{
    save_message, CommitRequest, ContentDigest, Revision, RevisionHandle, RevisionLog,
    MESSAGE_TAG, MIN_HANDLE_PREFIX,
};
pub use serializer::{SaveState, WriteScope, WriteSerializer};
pub use service::{
    BackupService, ErrorKind, ServiceError, ServiceResult, VaultStatus, VerifyReport,
};

/// Version of the docvault core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
