//! Transport node: one protocol tier bound to one upstream host.
//!
//! # Responsibilities
//! - Rewrite the request target to the upstream's scheme and authority
//! - Hand the request to the tier's executor
//! - Probe itself through the same executor
//!
//! # Design Decisions
//! - No retries here; failover belongs to the parent balancer
//! - The host resolver is consulted on every call, never cached

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderValue, Request, Response, Uri};
use url::Url;

use super::{Upstream, UpstreamError};
use crate::health::state::{HealthConfig, HealthSettings};
use crate::net::{Executor, HostResolver, ProtocolTier, TransportError};

/// Identifier of the tier child for `upstream`: its URL with the scheme
/// replaced by the tier name.
pub fn tier_identifier(tier: ProtocolTier, upstream: &Url) -> String {
    let authority = &upstream[url::Position::BeforeHost..url::Position::AfterPort];
    let path = &upstream[url::Position::BeforePath..];
    format!("{}://{}{}", tier, authority, path)
}

pub struct TransportNode {
    health: HealthConfig,
    upstream: Url,
    scheme: Scheme,
    authority: Authority,
    tier: ProtocolTier,
    resolver: HostResolver,
    executor: Arc<dyn Executor>,
}

impl fmt::Debug for TransportNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportNode")
            .field("identifier", &self.health.identifier())
            .field("tier", &self.tier)
            .field("upstream", &self.upstream.as_str())
            .field("executor", &self.executor)
            .finish()
    }
}

impl TransportNode {
    pub fn new(
        identifier: impl Into<String>,
        upstream: Url,
        tier: ProtocolTier,
        resolver: HostResolver,
        executor: Arc<dyn Executor>,
        settings: HealthSettings,
    ) -> Result<Self, TransportError> {
        let scheme: Scheme = upstream
            .scheme()
            .parse()
            .map_err(|_| TransportError::UnsupportedScheme(upstream.scheme().to_string()))?;
        let authority: Authority = upstream[url::Position::BeforeHost..url::Position::AfterPort]
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| {
                TransportError::Message(format!("invalid upstream authority: {}", e))
            })?;

        Ok(Self {
            health: HealthConfig::new(identifier, settings),
            upstream,
            scheme,
            authority,
            tier,
            resolver,
            executor,
        })
    }

    pub fn tier(&self) -> ProtocolTier {
        self.tier
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Point the request at the upstream, keeping path and query.
    fn rewrite(&self, request: &mut Request<Bytes>) -> Result<(), TransportError> {
        let path_and_query = request
            .uri()
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()?;
        *request.uri_mut() = uri;

        let host = HeaderValue::from_str(self.authority.as_str())
            .map_err(|e| TransportError::Message(format!("invalid host header: {}", e)))?;
        request.headers_mut().insert(header::HOST, host);
        Ok(())
    }
}

#[async_trait]
impl Upstream for TransportNode {
    fn health(&self) -> &HealthConfig {
        &self.health
    }

    async fn execute(&self, mut request: Request<Bytes>) -> Result<Response<Body>, UpstreamError> {
        let failed = |source: TransportError| UpstreamError::ExecutionFailed {
            identifier: self.health.identifier().to_string(),
            source,
        };

        self.rewrite(&mut request).map_err(failed)?;

        // the executor dials through its own copy of the resolver; this read only feeds the log
        let address = (self.resolver)();
        tracing::debug!(
            identifier = %self.health.identifier(),
            tier = %self.tier,
            address = %address,
            method = %request.method(),
            uri = %request.uri(),
            "Executing upstream request"
        );

        self.executor.execute(request).await.map_err(failed)
    }

    async fn active_health_check(&self) -> Result<(), UpstreamError> {
        self.health.active_probe(self).await
    }

    fn close(&self) -> Result<(), UpstreamError> {
        self.executor
            .close()
            .map_err(|source| UpstreamError::ExecutionFailed {
                identifier: self.health.identifier().to_string(),
                source,
            })
    }
}
