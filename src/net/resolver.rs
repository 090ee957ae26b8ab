//! Upstream host resolution.
//!
//! A `HostResolver` returns the address to dial for the single upstream host.
//! It is called lazily on every new connection so that address changes take
//! effect without rebuilding transports.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use hyper_util::client::legacy::connect::dns::Name as HyperName;
use reqwest::dns::{Addrs, Name as ReqwestName, Resolve, Resolving};
use tower::Service;
use url::Url;

/// Returns the IP address (or hostname) the upstream should be dialed at.
pub type HostResolver = Arc<dyn Fn() -> String + Send + Sync>;

/// Resolver returning `pinned` when set, otherwise the URL's hostname.
pub fn fixed(upstream: &Url, pinned: Option<String>) -> HostResolver {
    let address = pinned.unwrap_or_else(|| upstream.host_str().unwrap_or_default().to_string());
    Arc::new(move || address.clone())
}

/// Turn a resolver answer into socket addresses (port 0, the client fills it in).
pub async fn resolve_address(address: &str) -> io::Result<Vec<SocketAddr>> {
    let trimmed = address.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = trimmed.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, 0)]);
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((trimmed, 0)).await?.collect();
    if addrs.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", trimmed),
        ));
    }
    Ok(addrs)
}

/// Adapter plugging a `HostResolver` into reqwest's DNS hook.
pub struct ReqwestResolver {
    resolver: HostResolver,
}

impl ReqwestResolver {
    pub fn new(resolver: HostResolver) -> Self {
        Self { resolver }
    }
}

impl Resolve for ReqwestResolver {
    fn resolve(&self, _name: ReqwestName) -> Resolving {
        let address = (self.resolver)();
        Box::pin(async move {
            let addrs = resolve_address(&address).await?;
            let addrs: Addrs = Box::new(addrs.into_iter());
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}

/// Adapter plugging a `HostResolver` into hyper-util's `HttpConnector`.
#[derive(Clone)]
pub struct HyperResolver {
    resolver: HostResolver,
}

impl HyperResolver {
    pub fn new(resolver: HostResolver) -> Self {
        Self { resolver }
    }
}

impl Service<HyperName> for HyperResolver {
    type Response = std::vec::IntoIter<SocketAddr>;
    type Error = io::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _name: HyperName) -> Self::Future {
        let address = (self.resolver)();
        Box::pin(async move { resolve_address(&address).await.map(Vec::into_iter) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_prefers_pinned_address() {
        let url: Url = "https://example.com:8443/app".parse().unwrap();
        assert_eq!(fixed(&url, None)(), "example.com");
        assert_eq!(fixed(&url, Some("192.0.2.10".into()))(), "192.0.2.10");
    }

    #[tokio::test]
    async fn test_resolve_ip_literals() {
        let v4 = resolve_address("127.0.0.1").await.unwrap();
        assert_eq!(v4, vec!["127.0.0.1:0".parse::<SocketAddr>().unwrap()]);

        let v6 = resolve_address("[::1]").await.unwrap();
        assert_eq!(v6, vec!["[::1]:0".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn test_resolve_localhost_name() {
        let addrs = resolve_address("localhost").await.unwrap();
        assert!(addrs.iter().all(|a| a.ip().is_loopback()));
    }
}
