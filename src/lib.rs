//! Multi-protocol reverse proxy library.
//!
//! Forwards requests to one upstream origin through a small tree of
//! protocol-tier nodes (HTTP/3, HTTP/2) with per-node health tracking,
//! active and passive health checks and idempotent-only failover.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{BalancerNode, TransportNode, Upstream, UpstreamError};
