//! # docvault server
//!
//! HTTP front of a docvault vault.
//!
//! This crate provides:
//! - `GET /api/backup`: the current document, with the head handle in the
//!   `X-Docvault-Revision` header
//! - `PUT`/`POST /api/backup`: save a new document and answer with the new
//!   revision
//! - `GET /api/backup/history`: newest-first revisions
//! - `GET /api/health`: vault status, never behind the token
//!
//! # Authentication
//!
//! When an API token is configured, `/api/backup*` requires
//! `Authorization: Bearer <token>`:
//!
//! ```rust,ignore
//! use docvault_server::{BackupServer, ServerConfig};
//!
//! let config = ServerConfig::new("/srv/vault").with_api_token("s3cret");
//! let server = BackupServer::open(config)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod auth;
mod config;
mod error;
mod handler;
mod server;

pub use auth::{require_token, TokenGuard};
pub use config::{AllowedOrigins, ServerArgs, ServerConfig};
pub use error::{status_for, ApiError, ServerError, ServerResult};
pub use handler::{
    AppState, HistoryParams, RevisionView, SaveResponse, AUTHOR_HEADER, REVISION_HEADER,
};
pub use server::BackupServer;
