//! Balancer node: protocol-tier selection and dispatch.
//!
//! # Responsibilities
//! - Own the children (one per protocol tier, or nested balancers)
//! - Pick healthy candidates in a fresh random order per request
//! - Attempt candidates sequentially under the failover policy
//! - Feed passive-check verdicts and failures back into child health
//! - Own the health scheduler for its children
//!
//! # Design Decisions
//! - Uniform random order instead of per-request counters; no tier starves
//! - A non-idempotent request stops at its first failed candidate
//! - No lock is held while a request is in flight

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use rand::seq::SliceRandom;
use url::Url;

use super::transport::{tier_identifier, TransportNode};
use super::{clone_request, Children, Upstream, UpstreamError, UpstreamSnapshot};
use crate::health::active::HealthScheduler;
use crate::health::state::{HealthConfig, HealthSettings};
use crate::net::{HostResolver, ProtocolTier, TransportError, TransportFactory};
use crate::observability::metrics;
use crate::resilience::retries;

#[derive(Debug)]
pub struct BalancerNode {
    health: Arc<HealthConfig>,
    children: Arc<Children>,
    scheduler: HealthScheduler,
    /// Set by the first `execute`; health checks start lazily exactly once.
    dispatched: AtomicBool,
}

impl BalancerNode {
    /// Build a balancer over an explicit set of children.
    pub fn new(
        identifier: impl Into<String>,
        settings: HealthSettings,
        children: Vec<Arc<dyn Upstream>>,
    ) -> Self {
        let health = Arc::new(HealthConfig::new(identifier, settings));
        let children: Arc<Children> = Arc::new(
            children
                .into_iter()
                .map(|child| (child.identifier().to_string(), child))
                .collect(),
        );
        let scheduler = HealthScheduler::new(Arc::clone(&health), Arc::clone(&children));

        Self {
            health,
            children,
            scheduler,
            dispatched: AtomicBool::new(false),
        }
    }

    /// Build the standard balancer for one upstream: an HTTP/3 and an HTTP/2
    /// transport node sharing the same resolver and health settings.
    pub fn for_upstream(
        identifier: impl Into<String>,
        upstream: Url,
        resolver: HostResolver,
        settings: HealthSettings,
        transports: &dyn TransportFactory,
    ) -> Result<Self, TransportError> {
        let mut children: Vec<Arc<dyn Upstream>> = Vec::with_capacity(ProtocolTier::ALL.len());
        for tier in ProtocolTier::ALL {
            let executor = transports.build(tier, &upstream, Arc::clone(&resolver))?;
            let node = TransportNode::new(
                tier_identifier(tier, &upstream),
                upstream.clone(),
                tier,
                Arc::clone(&resolver),
                executor,
                settings.clone(),
            )?;
            children.push(Arc::new(node));
        }

        Ok(Self::new(identifier, settings, children))
    }

    pub fn children(&self) -> &Children {
        &self.children
    }

    /// Healthy children in uniformly random order.
    pub fn select_candidates(&self) -> Vec<Arc<dyn Upstream>> {
        let mut candidates: Vec<Arc<dyn Upstream>> = self
            .children
            .values()
            .filter(|child| child.is_healthy())
            .cloned()
            .collect();
        candidates.shuffle(&mut rand::thread_rng());
        candidates
    }

    pub fn active_check_enabled(&self) -> bool {
        self.health.active_check_enabled()
    }

    pub fn passive_check_enabled(&self) -> bool {
        self.health.passive_check_enabled()
    }
}

#[async_trait]
impl Upstream for BalancerNode {
    fn health(&self) -> &HealthConfig {
        &self.health
    }

    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Body>, UpstreamError> {
        if self.health.active_check_enabled() && !self.dispatched.swap(true, Ordering::AcqRel) {
            self.scheduler.start();
        }

        let candidates = self.select_candidates();
        if candidates.is_empty() {
            tracing::warn!(identifier = %self.identifier(), "No healthy upstream");
            return Err(UpstreamError::NoHealthyUpstream {
                identifier: self.identifier().to_string(),
            });
        }

        let may_fail_over = retries::is_idempotent(request.method());
        let passive = self.health.passive_check_enabled();
        let remaining = candidates.len();
        let mut errors = Vec::new();

        for (attempt, child) in candidates.into_iter().enumerate() {
            let error = match child.execute(clone_request(&request)).await {
                Ok(response) if !(passive && child.health().passive_check_enabled()) => {
                    return Ok(response);
                }
                Ok(response) => match child.passive_evaluate(&response) {
                    Ok(()) => {
                        child.health().on_success();
                        return Ok(response);
                    }
                    Err(e) => e,
                },
                Err(e) => e,
            };

            if passive {
                child.health().on_failure();
            }

            tracing::warn!(
                identifier = %self.identifier(),
                candidate = %child.identifier(),
                method = %request.method(),
                error = %error,
                "Upstream attempt failed"
            );

            if !may_fail_over {
                return Err(error);
            }
            errors.push(error);

            if attempt + 1 < remaining {
                metrics::record_failover(self.identifier());
            }
        }

        Err(UpstreamError::Exhausted {
            identifier: self.identifier().to_string(),
            errors,
        })
    }

    async fn active_health_check(&self) -> Result<(), UpstreamError> {
        self.health.active_probe(self).await
    }

    /// Applies to this node and every node below it.
    fn set_active_check_enabled(&self, enabled: bool) {
        self.health.set_active_check_enabled(enabled);
        for child in self.children.values() {
            child.set_active_check_enabled(enabled);
        }
    }

    /// Applies to this node and every node below it.
    fn set_passive_check_enabled(&self, enabled: bool) {
        self.health.set_passive_check_enabled(enabled);
        for child in self.children.values() {
            child.set_passive_check_enabled(enabled);
        }
    }

    fn scheduler(&self) -> Option<&HealthScheduler> {
        Some(&self.scheduler)
    }

    fn snapshot(&self) -> UpstreamSnapshot {
        UpstreamSnapshot::new(
            &self.health,
            "balancer",
            self.scheduler.is_running(),
            self.children.values().map(|child| child.snapshot()).collect(),
        )
    }

    fn close(&self) -> Result<(), UpstreamError> {
        self.scheduler.stop();

        let mut first_error = None;
        for child in self.children.values() {
            if let Err(e) = child.close() {
                tracing::warn!(identifier = %child.identifier(), error = %e, "Failed to close upstream");
                first_error.get_or_insert(e);
            }
        }
        tracing::info!(identifier = %self.identifier(), "Balancer closed");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
