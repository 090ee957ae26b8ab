//! Passive health checking (failure detection).
//!
//! # Responsibilities
//! - Judge live responses against the node's failure status range
//!
//! # Design Decisions
//! - Only the configured range counts as distress, `[500, 600)` by default
//! - 4xx are NOT failures (client error, not upstream)
//! - Transport errors are counted by the dispatcher, not here

use axum::http::Response;

use crate::health::state::HealthConfig;
use crate::load_balancer::UpstreamError;

impl HealthConfig {
    /// Succeeds iff the status falls outside the passive failure range.
    pub fn passive_evaluate<B>(&self, response: &Response<B>) -> Result<(), UpstreamError> {
        let range = self.settings().passive_check.failure_status;
        let status = response.status();
        if range.contains(status) {
            tracing::debug!(
                identifier = %self.identifier(),
                status = %status,
                "Passive check failed"
            );
            return Err(UpstreamError::PassiveCheckFailed {
                identifier: self.identifier().to_string(),
                status,
                range,
            });
        }
        Ok(())
    }
}
