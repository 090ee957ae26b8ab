//! HTTP/2 over TLS executor.
//!
//! Backed by a reqwest client pinned to HTTP/2 (ALPN `h2`). The client's DNS
//! hook is replaced by the upstream's `HostResolver`, so the SNI and `Host`
//! stay the upstream hostname while the socket goes to whatever address the
//! resolver currently answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response};

use super::resolver::{HostResolver, ReqwestResolver};
use super::{Executor, TransportError};

#[derive(Debug, Clone)]
pub struct H2Executor {
    client: reqwest::Client,
}

impl H2Executor {
    pub fn new(
        resolver: HostResolver,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .http2_prior_knowledge()
            .dns_resolver(Arc::new(ReqwestResolver::new(resolver)))
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Executor for H2Executor {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Body>, TransportError> {
        let (parts, body) = request.into_parts();

        let upstream = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await?;

        let mut builder = Response::builder()
            .status(upstream.status())
            .version(upstream.version());
        if let Some(headers) = builder.headers_mut() {
            *headers = upstream.headers().clone();
        }

        Ok(builder.body(Body::from_stream(upstream.bytes_stream()))?)
    }
}
