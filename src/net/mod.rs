//! Upstream transport subsystem.
//!
//! # Data Flow
//! ```text
//! TransportNode::execute (rewritten request)
//!     → Executor for the node's protocol tier
//!         - h2.rs          HTTP/2 over TLS (reqwest, ALPN h2)
//!         - h2c.rs         HTTP/2 cleartext, prior knowledge (hyper-util)
//!         - unsupported.rs tier with no linked dialer
//!     → resolver.rs (HostResolver consulted on every new connection)
//!     → Response or TransportError
//! ```
//!
//! # Design Decisions
//! - The load balancer never dials sockets itself; it only sees `Executor`
//! - Executors own their connection pools; one per protocol tier
//! - Every executor carries its own request deadline

pub mod h2;
pub mod h2c;
pub mod resolver;
pub mod unsupported;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};
use thiserror::Error;
use url::Url;

pub use resolver::HostResolver;

use self::h2::H2Executor;
use self::h2c::H2cExecutor;
use self::unsupported::UnsupportedExecutor;

/// Protocol tier used to reach an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolTier {
    /// HTTP/3 over QUIC.
    Http3,
    /// HTTP/2 (TLS with ALPN, or cleartext prior knowledge).
    Http2,
}

impl ProtocolTier {
    /// All tiers in preference order.
    pub const ALL: [ProtocolTier; 2] = [ProtocolTier::Http3, ProtocolTier::Http2];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolTier::Http3 => "http3",
            ProtocolTier::Http2 => "http2",
        }
    }
}

impl fmt::Display for ProtocolTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while executing a single upstream request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// reqwest client failure (connect, TLS, protocol, timeout).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// hyper-util client failure.
    #[error("client error: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    /// Request did not complete before the deadline.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A request or response head could not be built.
    #[error("http error: {0}")]
    Http(#[from] axum::http::Error),

    /// Host resolution failed.
    #[error("failed to resolve upstream address: {0}")]
    Resolve(#[source] std::io::Error),

    /// No dialer is linked for this tier.
    #[error("{tier} transport is not available")]
    Unsupported { tier: ProtocolTier },

    /// Upstream URL scheme cannot be served by the tier.
    #[error("unsupported upstream scheme '{0}'")]
    UnsupportedScheme(String),

    /// Free-form failure reported by an external executor.
    #[error("{0}")]
    Message(String),
}

/// Executes one request against one protocol tier of an upstream.
///
/// Implementations are expected to enforce their own timeouts.
#[async_trait]
pub trait Executor: Send + Sync + fmt::Debug {
    /// Send the request and wait for the response head.
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Body>, TransportError>;

    /// Release pooled connections. Further calls to `execute` may fail.
    fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Builds executors for the protocol tiers of an upstream.
pub trait TransportFactory: Send + Sync {
    fn build(
        &self,
        tier: ProtocolTier,
        upstream: &Url,
        resolver: HostResolver,
    ) -> Result<Arc<dyn Executor>, TransportError>;
}

/// Transports shipped with this crate.
///
/// HTTP/3 has no dialer here, so that tier gets an [`UnsupportedExecutor`]
/// and is routed around by health checking.
#[derive(Debug, Clone)]
pub struct DefaultTransports {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl DefaultTransports {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }
}

impl Default for DefaultTransports {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(30))
    }
}

impl TransportFactory for DefaultTransports {
    fn build(
        &self,
        tier: ProtocolTier,
        upstream: &Url,
        resolver: HostResolver,
    ) -> Result<Arc<dyn Executor>, TransportError> {
        match (tier, upstream.scheme()) {
            (ProtocolTier::Http3, _) => Ok(Arc::new(UnsupportedExecutor::new(tier))),
            (ProtocolTier::Http2, "https") => Ok(Arc::new(H2Executor::new(
                resolver,
                self.connect_timeout,
                self.request_timeout,
            )?)),
            (ProtocolTier::Http2, "http") => Ok(Arc::new(H2cExecutor::new(
                resolver,
                self.connect_timeout,
                self.request_timeout,
            ))),
            (ProtocolTier::Http2, other) => Err(TransportError::UnsupportedScheme(other.to_string())),
        }
    }
}
