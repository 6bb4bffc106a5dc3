//! Elasticity controller loop (C6) — periodically translates queue depth
//! into a target replica count for each managed worker deployment (§4.6).
//!
//! Stateless between ticks: convergence relies purely on repeated
//! observation of `depth`, never on anything the controller remembers
//! from the previous tick. An error evaluating one pair never prevents
//! evaluation of the others, or of the next tick (§4.6, §7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    broker::BrokerAdapter,
    config::{Limits, ManagedPair},
    orchestrator::OrchestratorAdapter,
};

pub struct Controller<B: BrokerAdapter, O: OrchestratorAdapter> {
    broker: Arc<B>,
    orchestrator: Arc<O>,
    managed_pairs: Vec<ManagedPair>,
    limits: Limits,
}

impl<B: BrokerAdapter, O: OrchestratorAdapter> Controller<B, O> {
    pub fn new(broker: Arc<B>, orchestrator: Arc<O>, managed_pairs: Vec<ManagedPair>, limits: Limits) -> Self {
        Self { broker, orchestrator, managed_pairs, limits }
    }

    /// Run until `shutdown` fires. The current tick always finishes before
    /// the loop exits — no forced cancellation mid-tick (§5).
    ///
    /// `alive` is flipped true for the duration of the loop so `/status`
    /// can report it.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>, alive: Arc<AtomicBool>) {
        info!(pairs = self.managed_pairs.len(), interval_secs = self.limits.check_interval.as_secs(), "elasticity controller starting");
        alive.store(true, Ordering::SeqCst);
        let mut interval = tokio::time::interval(self.limits.check_interval);
        interval.tick().await; // first tick fires immediately; consume it so we don't double-evaluate at t=0

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("controller loop stopping on shutdown signal");
                        alive.store(false, Ordering::SeqCst);
                        return;
                    }
                }
                _ = interval.tick() => self.tick().await,
            }
        }
    }

    /// Evaluate every managed pair once. Errors in one pair are logged and
    /// skipped; they never abort the tick.
    async fn tick(&self) {
        for pair in &self.managed_pairs {
            if let Err(e) = self.evaluate(pair).await {
                warn!(deployment = %pair.deployment, error = %e, "elasticity evaluation failed for this pair, continuing");
            }
        }
    }

    async fn evaluate(&self, pair: &ManagedPair) -> anyhow::Result<()> {
        let depth = self.broker.depth(&pair.queue).await;
        let target = desired_replicas(depth, pair.threshold, self.limits.min_replicas, self.limits.max_replicas);

        let current = self.orchestrator.get_replicas(&pair.deployment).await?;
        if current != target {
            info!(deployment = %pair.deployment, queue = %pair.queue, depth, current, target, "scaling deployment");
            self.orchestrator.set_replicas(&pair.deployment, target).await?;
        }
        Ok(())
    }
}

/// Pure replica-target calculation (§4.6, P5): `clamp(floor(depth/threshold)+1
/// if depth>0 else MIN_REPLICAS, MIN_REPLICAS, MAX_REPLICAS)`.
pub fn desired_replicas(depth: u64, threshold: u64, min_replicas: i32, max_replicas: i32) -> i32 {
    let raw = if depth > 0 { (depth / threshold) as i32 + 1 } else { min_replicas };
    raw.clamp(min_replicas, max_replicas)
}

#[allow(dead_code)]
pub fn default_check_interval() -> Duration {
    Duration::from_secs(10)
}
