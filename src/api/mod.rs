//! Read-only admin/status HTTP surface (§4.7, §6 "Admin HTTP surface").
//!
//! This is observability only — there is no job-ingestion HTTP endpoint in
//! this core; that boundary is explicitly out of scope (§1). Every route
//! here reads from already-computed state (`Config`, `RoutingEventLog`,
//! broker depth queries) and never feeds back into a routing decision.

pub mod admin;
pub mod admin_auth;
pub mod health;
pub mod metrics;
pub mod request_id;
pub mod status;

use std::{
    sync::{atomic::AtomicBool, Arc},
    time::Instant,
};

use crate::{broker::BrokerAdapter, config::Config, events::RoutingEventLog};

/// Shared application state injected into every admin request handler via
/// [`axum::extract::State`].
///
/// `broker` is a trait object rather than the concrete [`crate::broker::BrokerClient`]
/// so route handler tests can swap in the in-memory test double without
/// touching AMQP.
pub struct AppState {
    pub config: Arc<Config>,
    pub broker: Arc<dyn BrokerAdapter>,
    pub events: Arc<RoutingEventLog>,
    pub started_at: Instant,
    /// Flipped by [`crate::router::Router::run`] / [`crate::controller::Controller::run`]
    /// for the duration of their loops; surfaced by `/status` (§6).
    pub router_alive: Arc<AtomicBool>,
    pub controller_alive: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: Arc<Config>, broker: Arc<dyn BrokerAdapter>, events: Arc<RoutingEventLog>) -> Self {
        Self {
            config,
            broker,
            events,
            started_at: Instant::now(),
            router_alive: Arc::new(AtomicBool::new(false)),
            controller_alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach externally-owned liveness flags (used by the boot shell, which
    /// shares the same flags with the spawned router/controller loops).
    pub fn with_liveness_flags(mut self, router_alive: Arc<AtomicBool>, controller_alive: Arc<AtomicBool>) -> Self {
        self.router_alive = router_alive;
        self.controller_alive = controller_alive;
        self
    }
}

/// Build the admin axum router bound at `config.admin_bind_addr`.
///
/// `/healthz` is deliberately unauthenticated — it's the liveness probe a
/// Kubernetes kubelet or Docker HEALTHCHECK hits, which has no bearer token
/// to present. Every other route requires `ADMIN_TOKEN` when configured.
pub fn router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::get;

    let protected = axum::Router::new()
        .route("/status", get(status::status))
        .route("/admin/queues", get(admin::queues))
        .route("/admin/routing-events", get(admin::routing_events))
        .route("/admin/config", get(admin::config))
        .route("/metrics", get(metrics::metrics))
        .layer(axum::middleware::from_fn_with_state(Arc::clone(&state), admin_auth::admin_auth_middleware));

    axum::Router::new()
        .route("/healthz", get(health::healthz))
        .merge(protected)
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}
