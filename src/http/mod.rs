//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection (HTTP/1.1 or h2c)
//!     → server.rs (Axum setup, request ID, trace, limits)
//!     → request.rs (buffer body, strip hop-by-hop headers)
//!     → load_balancer::BalancerNode::execute
//!     → response.rs (strip hop-by-hop headers, 502 on engine error)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
