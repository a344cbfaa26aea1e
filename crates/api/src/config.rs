//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use reservation::ReservationConfig;
use tracing::Level;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Cross-origin policy applied to every route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    /// Allowed origins. `None` allows any origin.
    pub allowed_origins: Option<Vec<String>>,
}

/// HTTP request logging applied by the trace layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLogConfig {
    pub level: Level,
    pub include_headers: bool,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            include_headers: false,
        }
    }
}

/// How the authenticated principal reaches this service.
///
/// Authentication happens upstream; the gateway forwards the user ID in a
/// trusted header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub user_id_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user_id_header: "x-user-id".to_string(),
        }
    }
}

/// Parses a variable, treating a missing or malformed value as absent.
fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `CORS_ALLOWED_ORIGINS`: comma-separated origins; unset allows any
/// - `REQUEST_LOG_LEVEL`: level of request spans (default: `info`)
/// - `REQUEST_LOG_HEADERS`: include headers in request spans (default: `false`)
/// - `USER_ID_HEADER`: header carrying the user ID (default: `x-user-id`)
/// - `COMPENSATION_RETRIES`: extra attempts per compensating increment (default: `3`)
/// - `COMPENSATION_BACKOFF_MS`: delay between those attempts (default: `50`)
/// - `RESTOCK_ON_PERSISTENCE_FAILURE`: restore stock when storing an order fails (default: `false`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub cors: CorsConfig,
    pub request_log: RequestLogConfig,
    pub auth: AuthConfig,
    pub reservation: ReservationConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable source.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse_var(var("PORT")).unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match var("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: var("DATABASE_URL").filter(|url| !url.is_empty()),
            database_max_connections: parse_var(var("DATABASE_MAX_CONNECTIONS"))
                .unwrap_or(defaults.database_max_connections),
            cors: CorsConfig {
                allowed_origins: var("CORS_ALLOWED_ORIGINS").map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                }),
            },
            request_log: RequestLogConfig {
                level: parse_var(var("REQUEST_LOG_LEVEL")).unwrap_or(defaults.request_log.level),
                include_headers: parse_var(var("REQUEST_LOG_HEADERS"))
                    .unwrap_or(defaults.request_log.include_headers),
            },
            auth: AuthConfig {
                user_id_header: var("USER_ID_HEADER").unwrap_or(defaults.auth.user_id_header),
            },
            reservation: ReservationConfig {
                compensation_retries: parse_var(var("COMPENSATION_RETRIES"))
                    .unwrap_or(defaults.reservation.compensation_retries),
                compensation_backoff: parse_var(var("COMPENSATION_BACKOFF_MS"))
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reservation.compensation_backoff),
                restock_on_persistence_failure: parse_var(var("RESTOCK_ON_PERSISTENCE_FAILURE"))
                    .unwrap_or(defaults.reservation.restock_on_persistence_failure),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            database_max_connections: 10,
            cors: CorsConfig::default(),
            request_log: RequestLogConfig::default(),
            auth: AuthConfig::default(),
            reservation: ReservationConfig::default(),
        }
    }
}
