//! Errors surfaced by upstream nodes.

use axum::http::StatusCode;
use thiserror::Error;

use crate::health::state::StatusRange;
use crate::net::TransportError;

#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No child of the balancer is currently healthy.
    #[error("no healthy upstream available in {identifier}")]
    NoHealthyUpstream { identifier: String },

    /// An active probe failed. Recorded, never surfaced to traffic.
    #[error("health probe of {identifier} failed: {reason}")]
    ProbeFailed { identifier: String, reason: String },

    /// A live request could not be executed.
    #[error("request to {identifier} failed: {source}")]
    ExecutionFailed {
        identifier: String,
        #[source]
        source: TransportError,
    },

    /// A response arrived but its status signals upstream distress.
    #[error("{identifier} answered {status}, inside failure range {range}")]
    PassiveCheckFailed {
        identifier: String,
        status: StatusCode,
        range: StatusRange,
    },

    /// Every permitted candidate failed.
    #[error("all upstreams of {identifier} failed: {}", join_errors(.errors))]
    Exhausted {
        identifier: String,
        errors: Vec<UpstreamError>,
    },
}

fn join_errors(errors: &[UpstreamError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
