//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     HealthScheduler tick
//!     → probe every child concurrently
//!     → drain one HealthCheckResult per probe
//!     → set_healthy on each child (state.rs)
//!
//! Passive health checks (passive.rs):
//!     Live response observed by the balancer
//!     → status inside failure range?
//!     → on_failure (state.rs), counted against the failure window
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     Failures decay after a quiet window
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - Each check runs only when enabled on both the node and its parent
//! - Health state is per node; a tier can fail while its sibling serves

pub mod active;
pub mod passive;
pub mod state;

pub use active::{HealthCheckResult, HealthScheduler};
pub use state::{ActiveCheck, HealthConfig, HealthSettings, PassiveCheck, StatusRange};
