//! Executor for a protocol tier with no dialer linked into this build.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};

use super::{Executor, ProtocolTier, TransportError};

/// Fails every request; health checking routes traffic around it.
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedExecutor {
    tier: ProtocolTier,
}

impl UnsupportedExecutor {
    pub fn new(tier: ProtocolTier) -> Self {
        Self { tier }
    }
}

#[async_trait]
impl Executor for UnsupportedExecutor {
    async fn execute(&self, _request: Request<Bytes>) -> Result<Response<Body>, TransportError> {
        Err(TransportError::Unsupported { tier: self.tier })
    }
}
