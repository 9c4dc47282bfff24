//! Server configuration.
//!
//! Every setting can come from a `DOCVAULT_*` environment variable; command
//! line flags take precedence over the environment.

use clap::Parser;
use docvault_core::{Config, LockPolicy, MissingPolicy};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Which browser origins may call the API.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AllowedOrigins {
    /// Any origin (`*`).
    #[default]
    Any,
    /// Only the listed origins.
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Parses `*` or a comma-separated origin list. Blank entries are ignored.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let origins: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == "*") {
            Self::Any
        } else {
            Self::List(origins)
        }
    }
}

/// Configuration for the backup server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Vault directory holding the backup document and its history.
    pub repo_path: PathBuf,
    /// Shared bearer token; `None` disables the check.
    pub api_token: Option<String>,
    /// CORS origins.
    pub allowed_origins: AllowedOrigins,
    /// Directory of a static front-end served at `/`.
    pub static_dir: Option<PathBuf>,
    /// Longest time a read request waits for the core to answer. Saves are
    /// bounded by the core's lock policy instead.
    pub request_timeout: Duration,
    /// Vault settings.
    pub core: Config,
}

impl ServerConfig {
    /// Creates a configuration serving the vault at `repo_path`.
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5050)),
            repo_path: repo_path.into(),
            api_token: None,
            allowed_origins: AllowedOrigins::Any,
            static_dir: None,
            request_timeout: Duration::from_secs(30),
            core: Config::default(),
        }
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Requires `token` as a bearer token on backup endpoints.
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Sets the CORS origins.
    pub fn with_allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Serves the files under `dir` at `/`.
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Sets the read request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replaces the vault settings.
    pub fn with_core(mut self, core: Config) -> Self {
        self.core = core;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("data")
    }
}

/// Command line of `docvault-server`.
#[derive(Debug, Parser)]
#[command(name = "docvault-server")]
#[command(author, version, about = "Serve a versioned JSON backup over HTTP", long_about = None)]
pub struct ServerArgs {
    /// Vault directory
    #[arg(long, env = "DOCVAULT_REPO_PATH", default_value = "data")]
    pub repo_path: PathBuf,

    /// Branch (line of history) to commit onto
    #[arg(long, env = "DOCVAULT_BRANCH", default_value = docvault_core::DEFAULT_BRANCH)]
    pub branch: String,

    /// Address to listen on
    #[arg(long, env = "DOCVAULT_BIND", default_value = "127.0.0.1:5050")]
    pub bind: SocketAddr,

    /// Bearer token required on /api/backup (unset disables the check)
    #[arg(long, env = "DOCVAULT_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Allowed CORS origins: `*` or a comma-separated list
    #[arg(long, env = "DOCVAULT_ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    /// Directory of a static front-end to serve at `/`
    #[arg(long, env = "DOCVAULT_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// How long a save waits for the write lock, in milliseconds (0 = fail fast)
    #[arg(long, env = "DOCVAULT_LOCK_TIMEOUT_MS", default_value_t = 5000)]
    pub lock_timeout_ms: u64,

    /// Answer 404 instead of `{}` before the first save
    #[arg(long, env = "DOCVAULT_MISSING_NOT_FOUND")]
    pub missing_not_found: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerArgs {
    /// Builds the server configuration.
    #[must_use]
    pub fn into_config(self) -> ServerConfig {
        let lock_policy = match self.lock_timeout_ms {
            0 => LockPolicy::FailFast,
            ms => LockPolicy::Block {
                timeout: Duration::from_millis(ms),
            },
        };
        let missing_policy = if self.missing_not_found {
            MissingPolicy::NotFound
        } else {
            MissingPolicy::EmptyObject
        };
        let core = Config::default()
            .branch(self.branch)
            .lock_policy(lock_policy)
            .missing_policy(missing_policy);

        let mut config = ServerConfig::new(self.repo_path)
            .with_bind_addr(self.bind)
            .with_allowed_origins(AllowedOrigins::parse(&self.allowed_origins))
            .with_core(core);

        if let Some(token) = self.api_token.filter(|token| !token.trim().is_empty()) {
            config = config.with_api_token(token.trim());
        }
        if let Some(dir) = self.static_dir {
            config = config.with_static_dir(dir);
        }
        config
    }
}
