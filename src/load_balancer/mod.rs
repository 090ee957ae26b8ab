//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Front end
//!     → balancer.rs (BalancerNode::execute)
//!         - select healthy children, random order
//!         - try each candidate in turn
//!         - failover only for idempotent methods (resilience::retries)
//!     → transport.rs (TransportNode::execute, one per protocol tier)
//!     → net::Executor
//! ```
//!
//! # Design Decisions
//! - Both node kinds implement `Upstream`, so a balancer can be a child of a balancer
//! - Children are registered at construction and never change
//! - Each node owns its health state; a parent only reads and writes it through the trait

pub mod balancer;
pub mod error;
pub mod transport;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use serde::Serialize;

use crate::health::active::HealthScheduler;
use crate::health::state::HealthConfig;

pub use balancer::BalancerNode;
pub use error::UpstreamError;
pub use transport::TransportNode;

/// Children of a balancer keyed by identifier.
pub type Children = BTreeMap<String, Arc<dyn Upstream>>;

/// Capability set shared by transport and balancer nodes.
#[async_trait]
pub trait Upstream: Send + Sync + fmt::Debug {
    fn health(&self) -> &HealthConfig;

    fn identifier(&self) -> &str {
        self.health().identifier()
    }

    fn is_healthy(&self) -> bool {
        self.health().is_healthy()
    }

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Body>, UpstreamError>;

    /// Run one synthetic probe against this node.
    async fn active_health_check(&self) -> Result<(), UpstreamError>;

    /// Judge a live response returned by this node.
    fn passive_evaluate(&self, response: &Response<Body>) -> Result<(), UpstreamError> {
        self.health().passive_evaluate(response)
    }

    fn set_active_check_enabled(&self, enabled: bool) {
        self.health().set_active_check_enabled(enabled);
    }

    fn set_passive_check_enabled(&self, enabled: bool) {
        self.health().set_passive_check_enabled(enabled);
    }

    /// Present only on nodes that probe children.
    fn scheduler(&self) -> Option<&HealthScheduler> {
        None
    }

    fn start_health_checks(&self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.start();
        }
    }

    fn stop_health_checks(&self) {
        if let Some(scheduler) = self.scheduler() {
            scheduler.stop();
        }
    }

    fn health_checks_running(&self) -> bool {
        self.scheduler().is_some_and(HealthScheduler::is_running)
    }

    fn snapshot(&self) -> UpstreamSnapshot {
        UpstreamSnapshot::new(self.health(), "transport", false, Vec::new())
    }

    /// Stop background work and release transport resources.
    fn close(&self) -> Result<(), UpstreamError>;
}

/// Point-in-time view of a node and its children.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamSnapshot {
    pub identifier: String,
    pub kind: &'static str,
    pub healthy: bool,
    pub failure_count: u64,
    pub active_check_enabled: bool,
    pub passive_check_enabled: bool,
    pub health_check_running: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UpstreamSnapshot>,
}

impl UpstreamSnapshot {
    pub fn new(
        health: &HealthConfig,
        kind: &'static str,
        health_check_running: bool,
        children: Vec<UpstreamSnapshot>,
    ) -> Self {
        Self {
            identifier: health.identifier().to_string(),
            kind,
            healthy: health.is_healthy(),
            failure_count: health.failure_count(),
            active_check_enabled: health.active_check_enabled(),
            passive_check_enabled: health.passive_check_enabled(),
            health_check_running,
            children,
        }
    }
}

/// `http::Request` is not `Clone`; every candidate gets its own copy.
pub fn clone_request(request: &Request<Bytes>) -> Request<Bytes> {
    let mut clone = Request::new(request.body().clone());
    *clone.method_mut() = request.method().clone();
    *clone.uri_mut() = request.uri().clone();
    *clone.version_mut() = request.version();
    *clone.headers_mut() = request.headers().clone();
    clone
}
