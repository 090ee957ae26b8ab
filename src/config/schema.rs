//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::health::state::{
    StatusRange, DEFAULT_FAILURE_MAX_COUNT, DEFAULT_FAILURE_WINDOW, DEFAULT_INTERVAL,
};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Front-end listener.
    pub listener: ListenerConfig,

    /// The single upstream origin.
    pub upstream: UpstreamConfig,

    /// Active and passive health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:18080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:18080".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Identifier of the top-level balancer.
    pub identifier: String,

    /// Upstream URL, e.g. "https://workers.cloudflare.com/".
    pub url: String,

    /// Address to dial instead of resolving the URL's host.
    pub address: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            identifier: "upstream".to_string(),
            url: String::new(),
            address: None,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active (synthetic probe) checks.
    pub active_enabled: bool,

    /// Enable passive (live traffic) checks.
    pub passive_enabled: bool,

    /// Probe method.
    pub method: String,

    /// Probe path; defaults to the path of the upstream URL.
    pub path: Option<String>,

    /// Probe statuses counted as healthy, `[start, end)`.
    pub success_status: StatusRange,

    /// Live statuses counted as failures, `[start, end)`.
    pub failure_status: StatusRange,

    /// Probe interval in milliseconds.
    pub interval_ms: u64,

    /// Failure decay window in milliseconds.
    pub failure_window_ms: u64,

    /// Failures inside one window that mark a node unhealthy.
    pub failure_max_count: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            active_enabled: true,
            passive_enabled: true,
            method: "HEAD".to_string(),
            path: None,
            success_status: StatusRange::SUCCESS,
            failure_status: StatusRange::SERVER_ERROR,
            interval_ms: DEFAULT_INTERVAL.as_millis() as u64,
            failure_window_ms: DEFAULT_FAILURE_WINDOW.as_millis() as u64,
            failure_max_count: DEFAULT_FAILURE_MAX_COUNT,
        }
    }
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn failure_window(&self) -> Duration {
        Duration::from_millis(self.failure_window_ms)
    }
}

/// Timeout configuration for upstream requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            url = "https://origin.example/"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:18080");
        assert_eq!(config.upstream.identifier, "upstream");
        assert_eq!(config.health_check.method, "HEAD");
        assert_eq!(config.health_check.interval(), Duration::from_millis(10_000));
        assert_eq!(config.health_check.failure_window(), Duration::from_millis(10_000));
        assert_eq!(config.health_check.failure_max_count, 5);
        assert_eq!(config.health_check.success_status, StatusRange::SUCCESS);
        assert_eq!(config.health_check.failure_status, StatusRange::SERVER_ERROR);
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_health_check_overrides() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [health_check]
            method = "GET"
            path = "/healthz"
            success_status = [200, 400]
            interval_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.health_check.path.as_deref(), Some("/healthz"));
        assert_eq!(config.health_check.success_status, StatusRange::new(200, 400).unwrap());
        assert_eq!(config.health_check.interval(), Duration::from_millis(2500));
    }
}
