//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use url::Url;

use h3_reverse_proxy::health::HealthSettings;
use h3_reverse_proxy::net::{resolver, Executor, HostResolver, ProtocolTier, TransportError, TransportFactory};
use h3_reverse_proxy::BalancerNode;

pub const UPSTREAM: &str = "https://origin.test/";
pub const HTTP3_ID: &str = "http3://origin.test/";
pub const HTTP2_ID: &str = "http2://origin.test/";

/// What a mock executor does with each request.
#[derive(Debug, Clone)]
pub enum Behavior {
    Status(StatusCode),
    Fail(&'static str),
}

/// Programmable executor with a call counter. Successful responses carry
/// an `x-tier` header naming the executor.
#[derive(Debug)]
pub struct MockExecutor {
    name: String,
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl MockExecutor {
    pub fn new(name: &str, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, _request: Request<Bytes>) -> Result<Response<Body>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            Behavior::Status(status) => Ok(Response::builder()
                .status(status)
                .header("x-tier", self.name.as_str())
                .body(Body::empty())?),
            Behavior::Fail(message) => Err(TransportError::Message(message.to_string())),
        }
    }
}

/// Hands out prebuilt mock executors per tier.
pub struct MockTransports {
    executors: HashMap<ProtocolTier, Arc<MockExecutor>>,
}

impl MockTransports {
    pub fn new(http3: Arc<MockExecutor>, http2: Arc<MockExecutor>) -> Self {
        let mut executors = HashMap::new();
        executors.insert(ProtocolTier::Http3, http3);
        executors.insert(ProtocolTier::Http2, http2);
        Self { executors }
    }
}

impl TransportFactory for MockTransports {
    fn build(
        &self,
        tier: ProtocolTier,
        _upstream: &Url,
        _resolver: HostResolver,
    ) -> Result<Arc<dyn Executor>, TransportError> {
        let executor: Arc<dyn Executor> = self.executors[&tier].clone();
        Ok(executor)
    }
}

/// Health settings with active probing off and a long failure window.
pub fn passive_only() -> HealthSettings {
    HealthSettings {
        active_check_enabled: false,
        failure_window: Duration::from_secs(60),
        ..HealthSettings::default()
    }
}

/// A two-tier balancer over mock executors.
pub fn mock_balancer(
    http3: Behavior,
    http2: Behavior,
    settings: HealthSettings,
) -> (BalancerNode, Arc<MockExecutor>, Arc<MockExecutor>) {
    let http3 = MockExecutor::new("http3", http3);
    let http2 = MockExecutor::new("http2", http2);
    let upstream: Url = UPSTREAM.parse().unwrap();
    let balancer = BalancerNode::for_upstream(
        "origin",
        upstream.clone(),
        resolver::fixed(&upstream, None),
        settings,
        &MockTransports::new(http3.clone(), http2.clone()),
    )
    .unwrap();
    (balancer, http3, http2)
}

pub fn get(path: &str) -> Request<Bytes> {
    Request::get(path).body(Bytes::new()).unwrap()
}

/// Poll `condition` every 10ms for up to 2s.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Serve `router` on an ephemeral local port (HTTP/1.1 and h2c).
pub async fn start_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Spawn `server` and return once its listener address is known.
pub async fn spawn_server<F, Fut>(f: F) -> SocketAddr
where
    F: FnOnce(TcpListener) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(f(listener));
    addr
}
