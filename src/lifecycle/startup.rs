//! Startup orchestration.
//!
//! # Responsibilities
//! - Translate validated configuration into health settings
//! - Build the balancer tree for the configured upstream
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Transports come from a `TransportFactory`, so tests and embedders can
//!   swap the executors without touching the balancer

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::{ConfigError, ProxyConfig};
use crate::health::state::{ActiveCheck, HealthSettings, PassiveCheck};
use crate::load_balancer::BalancerNode;
use crate::net::{resolver, TransportError, TransportFactory};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid upstream url: {0}")]
    InvalidUpstream(#[from] url::ParseError),

    #[error("invalid health check method '{0}'")]
    InvalidMethod(String),

    #[error("failed to build transport: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Health settings shared by every node of the configured tree.
pub fn health_settings(config: &ProxyConfig, upstream: &Url) -> Result<HealthSettings, StartupError> {
    let health = &config.health_check;
    let method = Method::from_bytes(health.method.as_bytes())
        .map_err(|_| StartupError::InvalidMethod(health.method.clone()))?;
    let path = health
        .path
        .clone()
        .unwrap_or_else(|| upstream[url::Position::BeforePath..url::Position::AfterQuery].to_string());

    Ok(HealthSettings {
        active_check: ActiveCheck {
            method,
            path,
            success_status: health.success_status,
        },
        passive_check: PassiveCheck {
            failure_status: health.failure_status,
        },
        interval: health.interval(),
        failure_window: health.failure_window(),
        failure_max_count: health.failure_max_count,
        active_check_enabled: health.active_enabled,
        passive_check_enabled: health.passive_enabled,
    })
}

/// Build the top-level balancer: one HTTP/3 and one HTTP/2 child for the upstream.
pub fn build_balancer(
    config: &ProxyConfig,
    transports: &dyn TransportFactory,
) -> Result<BalancerNode, StartupError> {
    let upstream = Url::parse(&config.upstream.url)?;
    let settings = health_settings(config, &upstream)?;
    let resolver = resolver::fixed(&upstream, config.upstream.address.clone());

    let balancer = BalancerNode::for_upstream(
        config.upstream.identifier.clone(),
        upstream.clone(),
        resolver,
        settings,
        transports,
    )?;

    tracing::info!(
        identifier = %config.upstream.identifier,
        upstream = %upstream,
        children = balancer.children().len(),
        "Balancer built"
    );
    Ok(balancer)
}
