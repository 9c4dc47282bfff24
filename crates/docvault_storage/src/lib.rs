//! # docvault storage
//!
//! Lowest-level storage primitives for docvault.
//!
//! Two kinds of storage live here, and neither interprets the bytes it holds:
//!
//! - [`StorageBackend`]: an append-only byte log. The revision journal is
//!   built on top of it.
//! - [`atomic`]: whole-file replacement (write temp, fsync, rename, fsync the
//!   directory). The working document is stored this way so that a reader
//!   always observes either the previous or the next file, never a mix.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and throwaway histories
//! - [`FileBackend`] - For persistent journals using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use docvault_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"rev-1").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"rev-1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
