//! Router assembly and the serving loop.

use crate::auth::{require_token, TokenGuard};
use crate::config::{AllowedOrigins, ServerConfig};
use crate::error::ServerResult;
use crate::handler::{self, AppState, AUTHOR_HEADER, REVISION_HEADER};
use axum::extract::DefaultBodyLimit;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::get;
use axum::Router;
use docvault_core::BackupService;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// The backup server.
///
/// Owns the opened vault for as long as it lives.
///
/// # Example
///
/// ```no_run
/// use docvault_server::{BackupServer, ServerConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = BackupServer::open(ServerConfig::new("vault").with_api_token("s3cret"))?;
/// server.serve().await?;
/// # Ok(())
/// # }
/// ```
pub struct BackupServer {
    config: ServerConfig,
    service: Arc<BackupService>,
}

impl BackupServer {
    /// Opens the vault named by `config`.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let service = BackupService::open(&config.repo_path, config.core.clone())?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    /// Creates a server around an already opened service.
    pub fn with_service(config: ServerConfig, service: Arc<BackupService>) -> Self {
        Self { config, service }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the served vault.
    pub fn service(&self) -> &Arc<BackupService> {
        &self.service
    }

    /// Builds the HTTP router.
    pub fn router(&self) -> Router {
        let state = AppState::new(Arc::clone(&self.service), self.config.request_timeout);
        let guard = TokenGuard::new(self.config.api_token.as_deref());

        let backup = Router::new()
            .route(
                "/api/backup",
                get(handler::get_backup)
                    .put(handler::put_backup)
                    .post(handler::put_backup),
            )
            .route("/api/backup/history", get(handler::get_history))
            .route_layer(middleware::from_fn_with_state(guard, require_token));

        // Leave room above the document limit so oversized bodies reach
        // validation and get a JSON error instead of a bare 413.
        let body_limit = self.config.core.max_document_size.saturating_add(1);

        let mut router = Router::new()
            .route("/api/health", get(handler::health))
            .merge(backup)
            .layer(DefaultBodyLimit::max(body_limit))
            .with_state(state);

        if let Some(dir) = &self.config.static_dir {
            router = router.fallback_service(ServeDir::new(dir));
        }

        router
            .layer(cors_layer(&self.config.allowed_origins))
            .layer(TraceLayer::new_for_http())
    }

    /// Binds the configured address and serves until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        if self.config.api_token.is_none() {
            warn!("DOCVAULT_API_TOKEN is not set; backup endpoints are open to anyone who can reach them");
        }

        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %listener.local_addr()?,
            repo = %self.config.repo_path.display(),
            branch = %self.config.core.branch,
            "docvault server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("docvault server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for BackupServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupServer")
            .field("bind_addr", &self.config.bind_addr)
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, AUTHOR_HEADER])
        .expose_headers([REVISION_HEADER]);

    match origins {
        AllowedOrigins::Any => layer.allow_origin(Any),
        AllowedOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
