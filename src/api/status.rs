//! Status endpoint (`GET /status`).
//!
//! Reports liveness, uptime, and aggregate routing statistics derived from
//! the [`crate::events::RoutingEventLog`] window. No queue names, backend
//! URLs, or secrets are ever included here — see `/admin/config` for the
//! redacted configuration view.

use std::sync::{atomic::Ordering, Arc};

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use super::AppState;

/// `GET /status` — liveness, uptime, loop liveness flags, and aggregate
/// routing stats.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime_secs = state.started_at.elapsed().as_secs();
    let stats = state.events.stats().await;

    Json(json!({
        "status": "ok",
        "uptime_secs": uptime_secs,
        "router_alive": state.router_alive.load(Ordering::SeqCst),
        "controller_alive": state.controller_alive.load(Ordering::SeqCst),
        "routing": stats,
    }))
}
