//! In-memory routing-event log exposed through the admin API.
//!
//! [`RoutingEventLog`] is a fixed-capacity ring-buffer: once full, the
//! oldest entry is evicted to make room for the newest. This gives a
//! bounded, O(1) memory footprint regardless of message volume. Entries
//! here are pure bookkeeping — never consulted by the router or the
//! controller to make a decision (see §3's "Routing event" note).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::classify::{Platform, Tier};

/// Fixed-capacity ring-buffer of recent [`RoutingEvent`] records.
///
/// Safe to share across tasks via `Arc<RoutingEventLog>`. [`push`][Self::push]
/// uses a non-blocking `try_lock` so it never delays message processing; in
/// the unlikely event of lock contention the entry is silently dropped.
pub struct RoutingEventLog {
    capacity: usize,
    entries: Mutex<VecDeque<RoutingEvent>>,
}

impl RoutingEventLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(VecDeque::with_capacity(capacity)) }
    }

    /// Record a routing decision. Best-effort, non-blocking: if the mutex
    /// is contended the entry is dropped rather than blocking the hot path.
    pub fn push(&self, entry: RoutingEvent) {
        if let Ok(mut entries) = self.entries.try_lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Return up to `limit` recent entries, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<RoutingEvent> {
        let entries = self.entries.lock().await;
        entries.iter().rev().take(limit).cloned().collect()
    }

    /// Aggregate statistics over all buffered entries.
    pub async fn stats(&self) -> RoutingStats {
        let entries = self.entries.lock().await;
        let total = entries.len();
        let avg_duration_ms = if total == 0 {
            0.0
        } else {
            entries.iter().map(|e| e.duration_ms as f64).sum::<f64>() / total as f64
        };

        let abandoned_count = entries.iter().filter(|e| e.outcome == Outcome::Abandoned).count();
        let fallback_count = entries.iter().filter(|e| e.fallback_triggered).count();
        let decode_failure_count = entries.iter().filter(|e| e.decode_failure).count();

        let mut tier_counts: std::collections::HashMap<String, usize> = Default::default();
        for entry in entries.iter() {
            if let Some(tier) = entry.tier {
                *tier_counts.entry(tier.label().to_string()).or_default() += 1;
            }
        }

        RoutingStats { total_events: total, abandoned_count, fallback_count, decode_failure_count, avg_duration_ms, tier_counts }
    }
}

/// Terminal state of a processed ingress message (§4.5 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Abandoned,
}

/// A single routing decision record, purely for operator observability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingEvent {
    /// Internally generated id for log correlation — not the job id.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub job_id: String,
    pub platform: Option<Platform>,
    pub tier: Option<Tier>,
    /// Local queue name or bulk external job id, whichever applies.
    pub destination: Option<String>,
    pub score: Option<f64>,
    pub outcome: Outcome,
    pub decode_failure: bool,
    pub fallback_triggered: bool,
    pub duration_ms: u64,
}

impl RoutingEvent {
    pub fn decode_failure(job_id_hint: &str, duration_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            job_id: job_id_hint.to_string(),
            platform: None,
            tier: None,
            destination: None,
            score: None,
            outcome: Outcome::Abandoned,
            decode_failure: true,
            fallback_triggered: false,
            duration_ms,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn dispatched(
        job_id: String,
        platform: Platform,
        tier: Tier,
        destination: String,
        score: f64,
        outcome: Outcome,
        fallback_triggered: bool,
        duration_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            job_id,
            platform: Some(platform),
            tier: Some(tier),
            destination: Some(destination),
            score: Some(score),
            outcome,
            decode_failure: false,
            fallback_triggered,
            duration_ms,
        }
    }
}

/// Aggregate statistics derived from the current ring-buffer window.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingStats {
    pub total_events: usize,
    pub abandoned_count: usize,
    pub fallback_count: usize,
    pub decode_failure_count: usize,
    pub avg_duration_ms: f64,
    pub tier_counts: std::collections::HashMap<String, usize>,
}
