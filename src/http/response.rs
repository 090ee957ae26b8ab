//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hand upstream responses to the client with hop-by-hop headers removed
//! - Map engine errors to gateway failures
//!
//! # Design Decisions
//! - Streaming responses avoid buffering the entire body
//! - Every `UpstreamError` becomes 502; details go to the log, not the client

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::request::strip_hop_by_hop;
use crate::load_balancer::UpstreamError;

/// Forward an upstream response to the client.
pub fn from_upstream(response: Response<Body>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, body)
}

/// Gateway failure shown to the client.
pub fn bad_gateway(error: &UpstreamError) -> Response {
    let message = match error {
        UpstreamError::NoHealthyUpstream { .. } => "No healthy upstream available",
        _ => "Upstream request failed",
    };
    (StatusCode::BAD_GATEWAY, message).into_response()
}
