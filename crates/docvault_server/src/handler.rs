//! Request handlers for the backup endpoints.
//!
//! The core is blocking, so every call into it runs on the blocking pool.
//! A spawned job is never aborted: if the client goes away mid-save, the
//! save still completes (or rolls back) and releases the write lock.
//!
//! Reads are bounded by the request timeout. Saves are not: the lock policy
//! already bounds their wait, and answering before the outcome is known
//! would report a failure for a save that may still commit.

use crate::error::ApiError;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use docvault_core::{BackupService, Document, Revision, ServiceResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Response header carrying the head revision handle.
pub const REVISION_HEADER: HeaderName = HeaderName::from_static("x-docvault-revision");

/// Request header naming the author of a save.
pub const AUTHOR_HEADER: HeaderName = HeaderName::from_static("x-docvault-author");

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 1000;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The vault being served.
    pub service: Arc<BackupService>,
    /// Longest time a read handler waits for the core.
    pub request_timeout: Duration,
}

impl AppState {
    /// Creates handler state around `service`.
    pub fn new(service: Arc<BackupService>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }

    /// Runs a side-effect-free `job` on the blocking pool, giving up after
    /// the request timeout.
    async fn read<T, F>(&self, job: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&BackupService) -> ServiceResult<T> + Send + 'static,
    {
        match tokio::time::timeout(self.request_timeout, self.run(job)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::request_timeout()),
        }
    }

    /// Runs `job` on the blocking pool and waits for its outcome.
    async fn run<T, F>(&self, job: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&BackupService) -> ServiceResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        match tokio::task::spawn_blocking(move || job(&service)).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(join_err) => Err(ApiError::internal(format!("worker failed: {join_err}"))),
        }
    }
}

/// Public view of a revision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RevisionView {
    /// Revision handle.
    pub handle: String,
    /// Parent handle, absent for the first revision.
    pub parent: Option<String>,
    /// Position in history, starting at 1.
    pub sequence: u64,
    /// RFC 3339 commit time.
    pub timestamp: String,
    /// Author label.
    pub author: String,
    /// Commit message.
    pub message: String,
}

impl From<&Revision> for RevisionView {
    fn from(revision: &Revision) -> Self {
        Self {
            handle: revision.handle.to_string(),
            parent: revision.parent.as_ref().map(ToString::to_string),
            sequence: revision.sequence,
            timestamp: rfc3339(revision.timestamp),
            author: revision.author.clone(),
            message: revision.message.clone(),
        }
    }
}

fn rfc3339(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Body of a successful save.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResponse {
    /// Always true.
    pub ok: bool,
    /// The new head.
    pub revision: RevisionView,
}

/// `GET /api/backup`
pub async fn get_backup(State(state): State<AppState>) -> Result<Response, ApiError> {
    let (document, head) = state
        .read(|service| Ok((service.load()?, service.head())))
        .await?;

    let mut response = Json(document.into_value()).into_response();
    if let Some(head) = head {
        if let Ok(value) = HeaderValue::from_str(head.handle.as_str()) {
            response.headers_mut().insert(REVISION_HEADER, value);
        }
    }
    Ok(response)
}

/// `PUT /api/backup` and `POST /api/backup`
///
/// The body is taken as raw bytes so that malformed JSON is reported with the
/// same error body as every other rejection.
pub async fn put_backup(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SaveResponse>, ApiError> {
    let header_author = headers
        .get(AUTHOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|author| !author.is_empty())
        .map(str::to_string);

    let revision = state
        .run(move |service| {
            let author = header_author.or_else(|| body_author(service, &body));
            match author {
                Some(author) => service.save_as(&body, &author),
                None => service.save(&body),
            }
        })
        .await?;

    Ok(Json(SaveResponse {
        ok: true,
        revision: RevisionView::from(&revision),
    }))
}

fn body_author(service: &BackupService, body: &[u8]) -> Option<String> {
    Document::parse(body, service.config().max_document_size)
        .ok()?
        .author_hint()
        .map(str::to_string)
}

/// Query of `GET /api/backup/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Maximum number of revisions to return.
    pub limit: Option<usize>,
}

/// `GET /api/backup/history`
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let revisions = state.read(move |service| Ok(service.history(limit))).await?;

    let revisions: Vec<RevisionView> = revisions.iter().map(RevisionView::from).collect();
    Ok(Json(json!({ "ok": true, "revisions": revisions })))
}

/// `GET /api/health`
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let status = state.read(|service| Ok(service.status())).await?;

    Ok(Json(json!({
        "status": "ok",
        "repo": {
            "path": status.root.display().to_string(),
            "branch": status.branch,
            "backup_exists": status.document_exists,
            "head": status.head.as_ref().map(|head| head.handle.to_string()),
            "revisions": status.revisions,
        },
    })))
}
