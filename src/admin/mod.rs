//! Admin API.
//!
//! Bearer-protected JSON endpoints over the balancer's lifecycle controls:
//! status, recursive health snapshot, health-check start/stop and the
//! active/passive check switches.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::load_balancer::BalancerNode;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub balancer: Arc<BalancerNode>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/upstreams", get(get_upstreams))
        .route("/admin/health-check/start", post(start_health_checks))
        .route("/admin/health-check/stop", post(stop_health_checks))
        .route("/admin/checks", put(update_checks))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
