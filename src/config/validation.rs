//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream URL must be absolute http/https with a host
//! - Validate value ranges (interval > 0, failure_max_count > 0)
//! - Validate socket addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;

/// One semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.url.is_empty() {
        errors.push(ValidationError::new("upstream.url", "is required"));
    } else {
        match Url::parse(&config.upstream.url) {
            Ok(url) => {
                if !matches!(url.scheme(), "http" | "https") {
                    errors.push(ValidationError::new(
                        "upstream.url",
                        format!("scheme must be http or https, got '{}'", url.scheme()),
                    ));
                }
                if url.host_str().map_or(true, str::is_empty) {
                    errors.push(ValidationError::new("upstream.url", "must include a host"));
                }
            }
            Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
        }
    }

    if config.upstream.identifier.is_empty() {
        errors.push(ValidationError::new("upstream.identifier", "must not be empty"));
    }

    if let Some(address) = &config.upstream.address {
        if address.trim().is_empty() {
            errors.push(ValidationError::new("upstream.address", "must not be empty when set"));
        }
    }

    let health = &config.health_check;
    if Method::from_bytes(health.method.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "health_check.method",
            format!("'{}' is not a valid HTTP method", health.method),
        ));
    }
    if let Some(path) = &health.path {
        if !path.starts_with('/') {
            errors.push(ValidationError::new("health_check.path", "must start with '/'"));
        }
    }
    if health.interval_ms == 0 {
        errors.push(ValidationError::new("health_check.interval_ms", "must be greater than 0"));
    }
    if health.failure_max_count == 0 {
        errors.push(ValidationError::new(
            "health_check.failure_max_count",
            "must be greater than 0",
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_socket_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "is required when admin is enabled"));
        }
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            field,
            format!("'{}' is not a valid socket address", value),
        ));
    }
}
