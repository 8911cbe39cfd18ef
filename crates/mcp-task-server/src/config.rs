//! `ServerConfig`: the aggregate built once at startup by the Mode Selector,
//! assembled from environment variables (spec.md §6), mirroring the
//! teacher's `ServerConfig`/`HttpMcpServerBuilder` split between transport
//! shape and everything else.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use control_plane::{AuditConfig, BucketConfig, RateLimitConfig};
use task_batch::PoolConfig;

/// `MCP_TRANSPORT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Stdio,
    Http,
    Both,
}

impl TransportMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "http" => Some(Self::Http),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub port: u16,
    pub api_keys: Vec<String>,
    pub auth_disabled: bool,
    pub cors_allowed_origins: Vec<String>,
    pub heartbeat_interval_seconds: u64,
    pub connection_timeout_minutes: u64,
    pub max_connections: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8070,
            api_keys: Vec::new(),
            auth_disabled: false,
            cors_allowed_origins: Vec::new(),
            heartbeat_interval_seconds: 30,
            connection_timeout_minutes: 5,
            max_connections: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub max_tasks: u32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self { max_tasks: 1000 }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "mcp-task-server.sqlite3".to_string(),
        }
    }
}

/// The full object-graph configuration, read once by the Mode Selector.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportMode,
    pub http: HttpConfig,
    pub rate_limit: RateLimitConfig,
    pub pool: PoolConfig,
    pub audit: AuditConfig,
    pub resources: ResourceConfig,
    pub database: DatabaseConfig,
}

impl ServerConfig {
    /// Build from environment variables, falling back to the spec-mandated
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let transport = env::var("MCP_TRANSPORT")
            .ok()
            .and_then(|raw| TransportMode::parse(&raw))
            .unwrap_or(TransportMode::Stdio);

        let http = HttpConfig {
            port: env::var("MCP_HTTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8070),
            api_keys: env::var("MCP_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| vec![v])
                .unwrap_or_default(),
            auth_disabled: env_flag("MCP_HTTP_AUTH_DISABLED"),
            cors_allowed_origins: env::var("MCP_HTTP_CORS_ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
            ..HttpConfig::default()
        };

        let database = DatabaseConfig {
            path: env::var("DB_NAME").unwrap_or_else(|_| DatabaseConfig::default().path),
        };

        Self {
            transport,
            http,
            rate_limit: RateLimitConfig {
                default_bucket: BucketConfig::default(),
                overrides: HashMap::new(),
            },
            pool: PoolConfig::default(),
            audit: AuditConfig::default(),
            resources: ResourceConfig::default(),
            database,
        }
    }

    /// spec.md §4.8 rule 5: the HTTP server refuses to start with no keys
    /// configured unless the development flag explicitly disables auth.
    pub fn http_auth_is_satisfiable(&self) -> bool {
        self.http.auth_disabled || !self.http.api_keys.is_empty()
    }

    pub fn termination_duration(&self) -> Duration {
        Duration::from_secs(self.pool.termination_seconds)
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes")
    )
}
