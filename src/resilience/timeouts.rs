//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Report an expired deadline as `TransportError::Timeout`
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other transport errors
//! - A timeout is an ordinary execution failure for the failover policy

use std::future::Future;
use std::time::Duration;

use crate::net::TransportError;

/// Await `fut`, failing with `TransportError::Timeout` once `deadline` elapses.
pub async fn with_deadline<F, T, E>(deadline: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TransportError>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(TransportError::Timeout(deadline)),
    }
}
