use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use super::AdminState;
use crate::load_balancer::{Upstream, UpstreamSnapshot};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub upstream: String,
    pub healthy: bool,
    pub health_check_running: bool,
}

/// Body of `PUT /admin/checks`; absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CheckToggles {
    pub active: Option<bool>,
    pub passive: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckState {
    pub active: bool,
    pub passive: bool,
    pub health_check_running: bool,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let balancer = &state.balancer;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        upstream: balancer.identifier().to_string(),
        healthy: balancer.is_healthy(),
        health_check_running: balancer.health_checks_running(),
    })
}

pub async fn get_upstreams(State(state): State<AdminState>) -> Json<UpstreamSnapshot> {
    Json(state.balancer.snapshot())
}

pub async fn start_health_checks(State(state): State<AdminState>) -> Json<CheckState> {
    state.balancer.start_health_checks();
    tracing::info!(identifier = %state.balancer.identifier(), "Health checks started via admin API");
    Json(check_state(&state))
}

pub async fn stop_health_checks(State(state): State<AdminState>) -> Json<CheckState> {
    state.balancer.stop_health_checks();
    tracing::info!(identifier = %state.balancer.identifier(), "Health checks stopped via admin API");
    Json(check_state(&state))
}

pub async fn update_checks(
    State(state): State<AdminState>,
    Json(toggles): Json<CheckToggles>,
) -> Json<CheckState> {
    if let Some(active) = toggles.active {
        state.balancer.set_active_check_enabled(active);
    }
    if let Some(passive) = toggles.passive {
        state.balancer.set_passive_check_enabled(passive);
    }
    tracing::info!(
        identifier = %state.balancer.identifier(),
        active = ?toggles.active,
        passive = ?toggles.passive,
        "Check switches updated via admin API"
    );
    Json(check_state(&state))
}

fn check_state(state: &AdminState) -> CheckState {
    CheckState {
        active: state.balancer.active_check_enabled(),
        passive: state.balancer.passive_check_enabled(),
        health_check_running: state.balancer.health_checks_running(),
    }
}
