//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Serve HTTP/1.1 and h2c on one listener
//! - Wire up middleware (tracing, limits, request ID, timeout)
//! - Hand each request to the top-level balancer
//! - Observability (metrics, correlation IDs)

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{prepare, X_REQUEST_ID};
use crate::http::response::{bad_gateway, from_upstream};
use crate::lifecycle::Shutdown;
use crate::load_balancer::{BalancerNode, Upstream};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub balancer: Arc<BalancerNode>,
    pub max_body_size: usize,
}

/// HTTP front end for the reverse proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ProxyConfig, balancer: Arc<BalancerNode>) -> Self {
        let state = AppState {
            balancer,
            max_body_size: config.security.max_body_size,
        };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for in-process serving.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let method = request.method().clone();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %request.uri(),
        "Proxying request"
    );

    let request = match prepare(request, client, state.max_body_size).await {
        Ok(request) => request,
        Err(rejection) => {
            tracing::warn!(request_id = %request_id, rejection = ?rejection, "Request rejected");
            metrics::record_request(method.as_str(), rejection.status().as_u16(), start);
            return rejection.into_response();
        }
    };

    match state.balancer.execute(request).await {
        Ok(upstream) => {
            metrics::record_request(method.as_str(), upstream.status().as_u16(), start);
            from_upstream(upstream)
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                balancer = %state.balancer.identifier(),
                error = %e,
                "Upstream request failed"
            );
            let response = bad_gateway(&e);
            metrics::record_request(method.as_str(), response.status().as_u16(), start);
            response
        }
    }
}
