//! Active health checking.
//!
//! # Responsibilities
//! - Issue synthetic probes through a node's own execute path
//! - Periodically probe every child of a balancer concurrently
//! - Start and stop nested balancers' schedulers recursively
//!
//! # Design Decisions
//! - One tick fans out one task per child and drains every result before
//!   the next tick, so at most one probe generation is in flight
//! - Probe verdicts only set the health flag; they do not touch failure counters
//! - Stopping prevents new ticks; in-flight probes run to completion

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, Request};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::health::state::HealthConfig;
use crate::load_balancer::{Children, Upstream, UpstreamError};
use crate::observability::metrics;

/// User agent sent with every probe.
pub const PROBE_USER_AGENT: &str = concat!("h3-reverse-proxy-health-check/", env!("CARGO_PKG_VERSION"));

const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl HealthConfig {
    /// Probe `target` with the configured method and path.
    ///
    /// Succeeds iff the response status is inside the success range; any
    /// execution error is a failure.
    pub async fn active_probe(&self, target: &dyn Upstream) -> Result<(), UpstreamError> {
        let check = &self.settings().active_check;
        let probe_failed = |reason: String| UpstreamError::ProbeFailed {
            identifier: self.identifier().to_string(),
            reason,
        };

        let request = Request::builder()
            .method(check.method.clone())
            .uri(check.path.as_str())
            .header(header::USER_AGENT, PROBE_USER_AGENT)
            .body(Bytes::new())
            .map_err(|e| probe_failed(e.to_string()))?;

        match target.execute(request).await {
            Ok(response) if check.success_status.contains(response.status()) => Ok(()),
            Ok(response) => Err(probe_failed(format!(
                "status {} outside {}",
                response.status(),
                check.success_status
            ))),
            Err(e) => Err(probe_failed(e.to_string())),
        }
    }
}

/// Outcome of one probe task.
#[derive(Debug)]
pub struct HealthCheckResult {
    pub identifier: String,
    pub healthy: bool,
    pub error: Option<UpstreamError>,
}

struct RunningTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningTask {
    fn is_alive(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Periodic prober for the children of one balancer.
pub struct HealthScheduler {
    owner: Arc<HealthConfig>,
    children: Arc<Children>,
    task: Mutex<Option<RunningTask>>,
}

impl std::fmt::Debug for HealthScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthScheduler")
            .field("owner", &self.owner.identifier())
            .field("running", &self.is_running())
            .finish()
    }
}

impl HealthScheduler {
    pub fn new(owner: Arc<HealthConfig>, children: Arc<Children>) -> Self {
        Self {
            owner,
            children,
            task: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<RunningTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start probing. No-op when already running or when the owner has
    /// active checks disabled.
    pub fn start(&self) {
        if !self.owner.active_check_enabled() {
            tracing::debug!(identifier = %self.owner.identifier(), "Active checks disabled, scheduler not started");
            return;
        }

        {
            let mut task = self.lock();
            if task.as_ref().is_some_and(RunningTask::is_alive) {
                return;
            }

            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                tracing::warn!(identifier = %self.owner.identifier(), "No async runtime, health checks not started");
                return;
            };

            let interval = self.owner.settings().interval.max(MIN_INTERVAL);
            let (stop, stop_rx) = oneshot::channel();
            let handle = runtime.spawn(run_periodic_checks(
                Arc::clone(&self.owner),
                Arc::clone(&self.children),
                interval,
                stop_rx,
            ));
            *task = Some(RunningTask { stop, handle });

            tracing::info!(
                identifier = %self.owner.identifier(),
                interval_ms = interval.as_millis() as u64,
                children = self.children.len(),
                "Health checks started"
            );
        }

        for child in self.children.values() {
            child.start_health_checks();
        }
    }

    /// Stop probing here and in every nested balancer.
    pub fn stop(&self) {
        if let Some(task) = self.lock().take() {
            let _ = task.stop.send(());
            tracing::info!(identifier = %self.owner.identifier(), "Health checks stopped");
        }

        for child in self.children.values() {
            child.stop_health_checks();
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().as_ref().is_some_and(RunningTask::is_alive)
    }
}

impl Drop for HealthScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.lock().take() {
            task.handle.abort();
        }
    }
}

async fn run_periodic_checks(
    owner: Arc<HealthConfig>,
    children: Arc<Children>,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if owner.active_check_enabled() {
                    let results = probe_children(&children).await;
                    apply_results(&children, results);
                }
            }
            _ = &mut stop => {
                tracing::debug!(identifier = %owner.identifier(), "Health scheduler exiting");
                break;
            }
        }
    }
}

/// Probe every child with active checks enabled, concurrently, and collect
/// exactly one result per spawned probe.
pub async fn probe_children(children: &Children) -> Vec<HealthCheckResult> {
    let (tx, mut rx) = mpsc::channel(children.len().max(1));
    let mut spawned = 0usize;

    for (identifier, child) in children.iter() {
        if !child.health().active_check_enabled() {
            continue;
        }

        let tx = tx.clone();
        let child = Arc::clone(child);
        let identifier = identifier.clone();
        tokio::spawn(async move {
            let result = match child.active_health_check().await {
                Ok(()) => HealthCheckResult {
                    identifier,
                    healthy: true,
                    error: None,
                },
                Err(e) => HealthCheckResult {
                    identifier,
                    healthy: false,
                    error: Some(e),
                },
            };
            let _ = tx.send(result).await;
        });
        spawned += 1;
    }
    drop(tx);

    let mut results = Vec::with_capacity(spawned);
    for _ in 0..spawned {
        match rx.recv().await {
            Some(result) => results.push(result),
            // every sender is gone; a probe task panicked
            None => break,
        }
    }
    results
}

fn apply_results(children: &Children, results: Vec<HealthCheckResult>) {
    for result in results {
        let Some(child) = children.get(&result.identifier) else {
            continue;
        };

        metrics::record_probe(&result.identifier, result.healthy);
        match &result.error {
            None => tracing::debug!(identifier = %result.identifier, "Health probe succeeded"),
            Some(e) => tracing::debug!(identifier = %result.identifier, error = %e, "Health probe failed"),
        }
        child.health().set_healthy(result.healthy);
    }
}
