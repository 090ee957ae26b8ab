//! Per-node health state.
//!
//! # States
//! - Healthy: node is a candidate for traffic
//! - Unhealthy: node is skipped by candidate selection
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: failure_max_count failures inside one failure window
//! Unhealthy → Healthy: a later successful active probe
//! ```
//!
//! # Design Decisions
//! - Nodes start healthy (optimistic)
//! - One decay timer per burst, armed on the first failure only
//! - A fired timer that finds a newer epoch does nothing
//! - State changes logged for observability

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::observability::metrics;

/// Default active probe interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(10_000);
/// Default failure decay window.
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_millis(10_000);
/// Default number of failures inside one window that marks a node unhealthy.
pub const DEFAULT_FAILURE_MAX_COUNT: u64 = 5;

/// Half-open range of HTTP status codes, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u16; 2]", into = "[u16; 2]")]
pub struct StatusRange {
    pub start: u16,
    pub end: u16,
}

impl StatusRange {
    /// Successful responses, `[200, 300)`.
    pub const SUCCESS: StatusRange = StatusRange { start: 200, end: 300 };
    /// Server errors, `[500, 600)`.
    pub const SERVER_ERROR: StatusRange = StatusRange { start: 500, end: 600 };

    pub fn new(start: u16, end: u16) -> Result<Self, String> {
        if start >= end {
            return Err(format!("status range start {} must be below end {}", start, end));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, status: StatusCode) -> bool {
        (self.start..self.end).contains(&status.as_u16())
    }
}

impl TryFrom<[u16; 2]> for StatusRange {
    type Error = String;

    fn try_from([start, end]: [u16; 2]) -> Result<Self, Self::Error> {
        Self::new(start, end)
    }
}

impl From<StatusRange> for [u16; 2] {
    fn from(range: StatusRange) -> Self {
        [range.start, range.end]
    }
}

impl fmt::Display for StatusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Synthetic probe parameters.
#[derive(Debug, Clone)]
pub struct ActiveCheck {
    pub method: Method,
    /// Path and query probed on the upstream.
    pub path: String,
    pub success_status: StatusRange,
}

impl Default for ActiveCheck {
    fn default() -> Self {
        Self {
            method: Method::HEAD,
            path: "/".to_string(),
            success_status: StatusRange::SUCCESS,
        }
    }
}

/// Live-traffic evaluation parameters.
#[derive(Debug, Clone)]
pub struct PassiveCheck {
    pub failure_status: StatusRange,
}

impl Default for PassiveCheck {
    fn default() -> Self {
        Self {
            failure_status: StatusRange::SERVER_ERROR,
        }
    }
}

/// Immutable health parameters of one node.
#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub active_check: ActiveCheck,
    pub passive_check: PassiveCheck,
    pub interval: Duration,
    pub failure_window: Duration,
    pub failure_max_count: u64,
    pub active_check_enabled: bool,
    pub passive_check_enabled: bool,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            active_check: ActiveCheck::default(),
            passive_check: PassiveCheck::default(),
            interval: DEFAULT_INTERVAL,
            failure_window: DEFAULT_FAILURE_WINDOW,
            failure_max_count: DEFAULT_FAILURE_MAX_COUNT,
            active_check_enabled: true,
            passive_check_enabled: true,
        }
    }
}

#[derive(Debug)]
struct HealthState {
    healthy: bool,
    failure_count: u64,
    /// Bumped on every counter reset; a decay timer only acts on its own epoch.
    epoch: u64,
}

/// Health and failure bookkeeping for one node.
#[derive(Debug)]
pub struct HealthConfig {
    identifier: String,
    settings: HealthSettings,
    state: Arc<Mutex<HealthState>>,
    active_check_enabled: AtomicBool,
    passive_check_enabled: AtomicBool,
}

impl HealthConfig {
    pub fn new(identifier: impl Into<String>, settings: HealthSettings) -> Self {
        let identifier = identifier.into();
        metrics::record_upstream_health(&identifier, true);
        Self {
            active_check_enabled: AtomicBool::new(settings.active_check_enabled),
            passive_check_enabled: AtomicBool::new(settings.passive_check_enabled),
            identifier,
            settings,
            state: Arc::new(Mutex::new(HealthState {
                healthy: true,
                failure_count: 0,
                epoch: 0,
            })),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_healthy(&self) -> bool {
        self.lock().healthy
    }

    /// Set the health flag. Setting the current value again is a no-op.
    pub fn set_healthy(&self, healthy: bool) {
        let changed = {
            let mut state = self.lock();
            let changed = state.healthy != healthy;
            state.healthy = healthy;
            changed
        };

        if changed {
            if healthy {
                tracing::info!(identifier = %self.identifier, "Upstream marked healthy");
            } else {
                tracing::warn!(identifier = %self.identifier, "Upstream marked unhealthy");
            }
            metrics::record_upstream_health(&self.identifier, healthy);
        }
    }

    pub fn failure_count(&self) -> u64 {
        self.lock().failure_count
    }

    pub fn active_check_enabled(&self) -> bool {
        self.active_check_enabled.load(Ordering::Acquire)
    }

    pub fn set_active_check_enabled(&self, enabled: bool) {
        self.active_check_enabled.store(enabled, Ordering::Release);
    }

    pub fn passive_check_enabled(&self) -> bool {
        self.passive_check_enabled.load(Ordering::Acquire)
    }

    pub fn set_passive_check_enabled(&self, enabled: bool) {
        self.passive_check_enabled.store(enabled, Ordering::Release);
    }

    /// Record one failure.
    ///
    /// Reaching `failure_max_count` inside a non-zero window marks the node
    /// unhealthy. The first failure of a burst arms a timer that clears the
    /// counter after `failure_window` unless a reset happened in between.
    pub fn on_failure(&self) {
        if !self.passive_check_enabled() {
            return;
        }

        let window = self.settings.failure_window;
        let mut state = self.lock();
        state.failure_count += 1;
        let failure_count = state.failure_count;
        metrics::record_upstream_failure(&self.identifier);

        if !window.is_zero() && failure_count >= self.settings.failure_max_count {
            drop(state);
            tracing::debug!(
                identifier = %self.identifier,
                failure_count,
                "Failure threshold reached"
            );
            self.set_healthy(false);
        } else if failure_count == 1 {
            let epoch = state.epoch;
            drop(state);
            self.schedule_decay(epoch, window);
        }
    }

    /// A successful probe brings the node back.
    pub fn on_success(&self) {
        self.set_healthy(true);
    }

    /// Clear the failure counter and invalidate any pending decay timer.
    pub fn reset_failures(&self) {
        let mut state = self.lock();
        state.failure_count = 0;
        state.epoch = state.epoch.wrapping_add(1);
    }

    fn schedule_decay(&self, epoch: u64, window: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(identifier = %self.identifier, "No runtime, failure decay skipped");
            return;
        };

        let state = Arc::clone(&self.state);
        let identifier = self.identifier.clone();
        handle.spawn(async move {
            tokio::time::sleep(window).await;
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.epoch == epoch && state.failure_count >= 1 {
                state.failure_count = 0;
                state.epoch = state.epoch.wrapping_add(1);
                tracing::debug!(identifier = %identifier, "Failure counter decayed");
            }
        });
    }
}
