//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (every executor call carries a deadline)
//!     → On failure: retries.rs (may the request move to the next candidate?)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Failover only for idempotent requests (GET, HEAD, etc.)
//! - Health bookkeeping, not a circuit breaker, removes failing tiers

pub mod retries;
pub mod timeouts;
