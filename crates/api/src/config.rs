//! Application configuration loaded from environment variables.

use std::time::Duration;

use orchestrator::CompensationPolicy;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; unset selects the in-memory store
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
/// - `AUTH_SERVICE_URL`: identity service base URL (default: `"http://localhost:8081"`)
/// - `PRODUCT_SERVICE_URL`: inventory service base URL (default: `"http://localhost:8082"`)
/// - `JWT_SECRET`: HS256 secret for bearer tokens (default: `"your-secret-key"`)
/// - `REMOTE_TIMEOUT_SECS`: per-call timeout for remote services (default: `10`)
/// - `INVENTORY_COMPENSATION`: reverse inventory decrements on failure (default: `true`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub auth_service_url: String,
    pub product_service_url: String,
    pub jwt_secret: String,
    pub remote_timeout: Duration,
    pub inventory_compensation: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.database_max_connections),
            auth_service_url: lookup("AUTH_SERVICE_URL").unwrap_or(defaults.auth_service_url),
            product_service_url: lookup("PRODUCT_SERVICE_URL")
                .unwrap_or(defaults.product_service_url),
            jwt_secret: lookup("JWT_SECRET").unwrap_or(defaults.jwt_secret),
            remote_timeout: lookup("REMOTE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.remote_timeout),
            inventory_compensation: lookup("INVENTORY_COMPENSATION")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.inventory_compensation),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the configured inventory compensation policy.
    pub fn compensation_policy(&self) -> CompensationPolicy {
        if self.inventory_compensation {
            CompensationPolicy::ReverseDeltas
        } else {
            CompensationPolicy::Disabled
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 5,
            auth_service_url: "http://localhost:8081".to_string(),
            product_service_url: "http://localhost:8082".to_string(),
            jwt_secret: "your-secret-key".to_string(),
            remote_timeout: Duration::from_secs(10),
            inventory_compensation: true,
        }
    }
}
