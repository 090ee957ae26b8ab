//! Failover policy.
//!
//! # Responsibilities
//! - Decide whether a failed request may be replayed on another candidate
//!
//! # Design Decisions
//! - Only idempotent methods fail over (GET, PUT, DELETE, HEAD, OPTIONS)
//! - POST and PATCH are never replayed; a second attempt could duplicate a side effect
//! - Candidates are tried sequentially, never in parallel

use axum::http::Method;

/// Methods that may be replayed against the next candidate.
pub const IDEMPOTENT_METHODS: [Method; 5] = [
    Method::GET,
    Method::PUT,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
];

/// Returns true when a request with this method may fail over.
pub fn is_idempotent(method: &Method) -> bool {
    IDEMPOTENT_METHODS.contains(method)
}
