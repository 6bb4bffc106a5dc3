//! Prometheus-compatible `/metrics` endpoint.
//!
//! All metrics derive from the in-memory [`crate::events::RoutingEventLog`]
//! window plus a live depth query against each observed queue. Because the
//! event log has a fixed capacity, the per-tier counters represent a
//! **sliding window** of recent routing decisions, not lifetime totals —
//! `TYPE gauge` is used throughout for that reason.
//!
//! Metric families:
//! - `cost_router_window_size`           — entries currently in the routing-event window
//! - `cost_router_routed_total`          — per-tier routed job counts
//! - `cost_router_abandoned_total`       — abandoned-message count in the window
//! - `cost_router_fallback_total`        — bulk-to-local fallback count in the window
//! - `cost_router_decode_failures_total` — malformed-message count in the window
//! - `cost_router_avg_duration_ms`       — average per-message handling time
//! - `cost_router_queue_depth`           — current depth, per observed queue

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};

use super::AppState;

/// `GET /metrics` — renders Prometheus text format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.events.stats().await;

    let mut out = String::with_capacity(1024);

    out.push_str("# HELP cost_router_window_size Number of routing events currently held in the ring-buffer window.\n");
    out.push_str("# TYPE cost_router_window_size gauge\n");
    out.push_str(&format!("cost_router_window_size {}\n\n", stats.total_events));

    out.push_str("# HELP cost_router_routed_total Routed job count in the current window, labelled by tier.\n");
    out.push_str("# TYPE cost_router_routed_total gauge\n");
    let mut tier_rows: Vec<_> = stats.tier_counts.iter().collect();
    tier_rows.sort_by(|a, b| a.0.cmp(b.0));
    for (tier, count) in tier_rows {
        out.push_str(&format!("cost_router_routed_total{{tier=\"{tier}\"}} {count}\n"));
    }
    out.push('\n');

    out.push_str("# HELP cost_router_abandoned_total Messages abandoned in the current window.\n");
    out.push_str("# TYPE cost_router_abandoned_total gauge\n");
    out.push_str(&format!("cost_router_abandoned_total {}\n\n", stats.abandoned_count));

    out.push_str("# HELP cost_router_fallback_total Bulk-to-local fallbacks in the current window.\n");
    out.push_str("# TYPE cost_router_fallback_total gauge\n");
    out.push_str(&format!("cost_router_fallback_total {}\n\n", stats.fallback_count));

    out.push_str("# HELP cost_router_decode_failures_total Malformed messages in the current window.\n");
    out.push_str("# TYPE cost_router_decode_failures_total gauge\n");
    out.push_str(&format!("cost_router_decode_failures_total {}\n\n", stats.decode_failure_count));

    out.push_str("# HELP cost_router_avg_duration_ms Average per-message handling time in the current window.\n");
    out.push_str("# TYPE cost_router_avg_duration_ms gauge\n");
    out.push_str(&format!("cost_router_avg_duration_ms {}\n\n", stats.avg_duration_ms));

    out.push_str("# HELP cost_router_queue_depth Current message count per observed queue.\n");
    out.push_str("# TYPE cost_router_queue_depth gauge\n");
    for queue in super::admin::OBSERVED_QUEUES {
        let depth = state.broker.depth(queue).await;
        out.push_str(&format!("cost_router_queue_depth{{queue=\"{queue}\"}} {depth}\n"));
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")], out)
}
