//! HTTP/2 cleartext (prior knowledge) executor for `http://` upstreams.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response, Version};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use super::resolver::{HostResolver, HyperResolver};
use super::{Executor, TransportError};
use crate::resilience::timeouts::with_deadline;

#[derive(Debug, Clone)]
pub struct H2cExecutor {
    client: Client<HttpConnector<HyperResolver>, Body>,
    request_timeout: Duration,
}

impl H2cExecutor {
    pub fn new(resolver: HostResolver, connect_timeout: Duration, request_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new_with_resolver(HyperResolver::new(resolver));
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .http2_only(true)
            .build(connector);

        Self {
            client,
            request_timeout,
        }
    }
}

#[async_trait]
impl Executor for H2cExecutor {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Body>, TransportError> {
        let mut request = request.map(Body::from);
        *request.version_mut() = Version::HTTP_2;
        let response = with_deadline(self.request_timeout, self.client.request(request)).await?;
        Ok(response.map(Body::new))
    }
}
