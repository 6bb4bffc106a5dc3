//! Router loop (C5) — the brain of cost-router.
//!
//! Consumes the ingress queue (`jobqueue`), classifies each job, and
//! dispatches it to a downstream local queue or the bulk-compute adapter,
//! acknowledging the ingress message only after the downstream publish is
//! durably accepted (§4.5, §9 "at-least-once semantics").
//!
//! Concurrency is single-consumer by design (prefetch 1, §5): this loop
//! never fans a message out to concurrent handlers, so ack ordering per
//! message is trivial. Horizontal scaling is achieved by running more
//! router instances against the same broker, not more in-process workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::{
    broker::{BrokerAdapter, BrokerMessage},
    bulk::BulkComputeAdapter,
    classify::{classify, ClassifierThresholds, JobDescriptor, Platform},
    events::{Outcome, RoutingEvent, RoutingEventLog},
};

/// Fixed ingress queue name (§3, §6) — the router's single entry point.
pub const INGRESS_QUEUE: &str = "jobqueue";

/// The router loop, generic over the broker adapter so tests can supply
/// an in-memory double without touching AMQP (§9 "Adapter polymorphism").
pub struct Router<B: BrokerAdapter> {
    broker: Arc<B>,
    bulk: Option<Arc<BulkComputeAdapter>>,
    events: Arc<RoutingEventLog>,
    thresholds: ClassifierThresholds,
    receive_max_wait: Duration,
}

impl<B: BrokerAdapter> Router<B> {
    pub fn new(
        broker: Arc<B>,
        bulk: Option<Arc<BulkComputeAdapter>>,
        events: Arc<RoutingEventLog>,
        thresholds: ClassifierThresholds,
        receive_max_wait: Duration,
    ) -> Self {
        Self { broker, bulk, events, thresholds, receive_max_wait }
    }

    /// Run until `shutdown` fires. A message in flight always reaches a
    /// terminal state (Completed or Abandoned) before the loop checks
    /// shutdown again — no forced cancellation of in-flight work (§5).
    ///
    /// `alive` is flipped true for the duration of the loop so `/status`
    /// can report it; it is always flipped back to false on exit, even if
    /// the loop is dropped via a panic unwind through the caller.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>, alive: Arc<AtomicBool>) {
        info!(queue = INGRESS_QUEUE, "router loop starting");
        alive.store(true, Ordering::SeqCst);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("router loop stopping on shutdown signal");
                        alive.store(false, Ordering::SeqCst);
                        return;
                    }
                }
                result = self.broker.receive(INGRESS_QUEUE, self.receive_max_wait) => {
                    match result {
                        Ok(Some(msg)) => self.handle(msg).await,
                        Ok(None) => {} // idle poll, normal (§4.5 step 2)
                        Err(e) => warn!(error = %e, "receive failed — will retry next poll"),
                    }
                }
            }
        }
    }

    /// Process exactly one received message end to end. Never lets an
    /// error escape — every path ends in either `complete` or `abandon`
    /// (P1), and a [`RoutingEvent`] is always recorded.
    async fn handle(&self, msg: BrokerMessage) {
        let t0 = Instant::now();
        let body = msg.body.clone();

        let descriptor = match JobDescriptor::decode(&body) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "decode failure — abandoning message");
                if let Err(e) = self.broker.abandon(msg).await {
                    warn!(error = %e, "abandon failed after decode failure");
                }
                self.events.push(RoutingEvent::decode_failure("unknown", elapsed_ms(t0)));
                return;
            }
        };

        let routing = classify(&descriptor, self.bulk.is_some(), self.thresholds);
        let score = descriptor.cost_score();

        let (destination, outcome, fallback_triggered) =
            self.dispatch(&descriptor, &body, routing.platform, routing.tier).await;

        match outcome {
            Outcome::Completed => {
                if let Err(e) = self.broker.complete(msg).await {
                    warn!(job_id = %descriptor.job_id, error = %e, "ack failed after successful dispatch");
                }
            }
            Outcome::Abandoned => {
                if let Err(e) = self.broker.abandon(msg).await {
                    warn!(job_id = %descriptor.job_id, error = %e, "abandon failed after dispatch failure");
                }
            }
        }

        debug!(
            job_id = %descriptor.job_id,
            platform = ?routing.platform,
            tier = ?routing.tier,
            destination = %destination.as_deref().unwrap_or("-"),
            score,
            fallback_triggered,
            ?outcome,
            "job routed"
        );

        self.events.push(RoutingEvent::dispatched(
            descriptor.job_id.clone(),
            routing.platform,
            routing.tier,
            destination.unwrap_or_default(),
            score,
            outcome,
            fallback_triggered,
            elapsed_ms(t0),
        ));
    }

    /// Attempt the primary dispatch, falling back from bulk to the local
    /// queue on failure (§4.5 step 5, P7). Returns the destination
    /// description, the terminal outcome, and whether fallback fired.
    ///
    /// `body` is the exact bytes received on ingress. Every local send
    /// forwards `body` verbatim rather than re-encoding `descriptor` — the
    /// descriptor's `raw_payload` is a `serde_json::Value` (a key-sorting
    /// map without the `preserve_order` feature), so re-serializing it
    /// would silently reorder payload keys and violate P6 / §6's
    /// bit-identical forwarding guarantee.
    async fn dispatch(
        &self,
        descriptor: &JobDescriptor,
        body: &[u8],
        platform: Platform,
        tier: crate::classify::Tier,
    ) -> (Option<String>, Outcome, bool) {
        if platform == Platform::Bulk {
            let bulk = self.bulk.as_ref().expect("bulk_available implies bulk adapter is set");
            match bulk.submit(&descriptor.job_id, &descriptor.raw_payload, tier.label()).await {
                Ok(submission) => return (Some(submission.external_job_id), Outcome::Completed, false),
                Err(e) => {
                    warn!(job_id = %descriptor.job_id, error = %e, "bulk submit failed — falling back to local queue");
                }
            }

            // Fallback: the bulk attempt is considered not-dispatched (§3 invariant).
            let queue = tier.local_queue();
            return match self.broker.send(queue, body).await {
                Ok(()) => (Some(queue.to_string()), Outcome::Completed, true),
                Err(e) => {
                    warn!(job_id = %descriptor.job_id, queue, error = %e, "fallback send failed — abandoning");
                    (Some(queue.to_string()), Outcome::Abandoned, true)
                }
            };
        }

        let queue = tier.local_queue();
        match self.broker.send(queue, body).await {
            Ok(()) => (Some(queue.to_string()), Outcome::Completed, false),
            Err(e) => {
                warn!(job_id = %descriptor.job_id, queue, error = %e, "local send failed — abandoning");
                (Some(queue.to_string()), Outcome::Abandoned, false)
            }
        }
    }
}

fn elapsed_ms(t0: Instant) -> u64 {
    t0.elapsed().as_millis() as u64
}
