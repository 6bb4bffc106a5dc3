//! Job descriptors, cost scoring, and the routing classifier.
//!
//! [`classify`] is the only function in this module that makes a routing
//! decision; everything else is data. It is pure — no I/O, no clock, no
//! randomness — so it can be exhaustively unit-tested without mocking
//! anything.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Priority hint carried in a job payload. Doubles the cost weight when `High`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    Normal,
    High,
}

impl Priority {
    fn weight(self) -> f64 {
        match self {
            Priority::Normal => 1.0,
            Priority::High => 2.0,
        }
    }
}

/// The recognized, typed subset of a job payload. Unknown keys are not
/// represented here — they live in [`JobDescriptor::raw_payload`] and are
/// forwarded verbatim, never touched by this struct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayloadFields {
    #[serde(default = "defaults::rows")]
    pub rows: u64,
    #[serde(default = "defaults::estimated_runtime_sec")]
    pub estimated_runtime_sec: u64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub latency_sensitive: bool,
    /// Opaque to the core; forwarded verbatim by `data`.
    #[serde(default)]
    pub data: Value,
}

mod defaults {
    pub fn rows() -> u64 {
        1_000
    }
    pub fn estimated_runtime_sec() -> u64 {
        10
    }
}

/// A job descriptor as received on the ingress queue.
///
/// `raw_payload` retains the original JSON object exactly as received —
/// including any keys [`PayloadFields`] doesn't recognize — so unknown
/// payload keys survive classification. The router never re-serializes
/// this descriptor for forwarding, though: the received message bytes are
/// forwarded verbatim to preserve bit-identical wire fidelity (P6 in the
/// routing contract) — `serde_json::Value`'s key ordering isn't stable
/// across a decode/encode round trip without the `preserve_order` feature.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub job_id: String,
    pub raw_payload: Value,
    pub fields: PayloadFields,
}

impl JobDescriptor {
    /// Decode a job descriptor from its canonical wire form.
    ///
    /// Returns an error for anything that isn't a JSON object with a
    /// non-empty string `job_id` and an object (or missing) `payload`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_slice(bytes).map_err(DecodeError::InvalidJson)?;
        let obj = value.as_object().ok_or(DecodeError::NotAnObject)?;

        let job_id = obj
            .get("job_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(DecodeError::MissingJobId)?
            .to_owned();

        let raw_payload = obj.get("payload").cloned().unwrap_or_else(|| Value::Object(Default::default()));
        if !raw_payload.is_object() {
            return Err(DecodeError::PayloadNotAnObject);
        }

        let fields: PayloadFields =
            serde_json::from_value(raw_payload.clone()).map_err(DecodeError::InvalidPayload)?;

        Ok(Self { job_id, raw_payload, fields })
    }

    /// The dimensionless cost score (§3): `(rows/1e6 + runtime/60) * weight`.
    pub fn cost_score(&self) -> f64 {
        let rows_cost = self.fields.rows as f64 / 1_000_000.0;
        let time_cost = self.fields.estimated_runtime_sec as f64 / 60.0;
        (rows_cost + time_cost) * self.fields.priority.weight()
    }
}

/// Failure decoding a message body as a job descriptor. Always permanent
/// for that message — the caller abandons rather than retries verbatim.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
    #[error("message body is not a JSON object")]
    NotAnObject,
    #[error("missing or empty `job_id`")]
    MissingJobId,
    #[error("`payload` is present but not a JSON object")]
    PayloadNotAnObject,
    #[error("invalid payload fields: {0}")]
    InvalidPayload(serde_json::Error),
}

/// Execution tier, ordered by expected compute weight (`Actor < Ml < Spark`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Actor,
    Ml,
    Spark,
}

impl Tier {
    /// The local downstream queue suffix convention: `"{tier}-jobs"`.
    ///
    /// This is distinct from the bulk-compute tier label passed to
    /// [`crate::bulk::BulkComputeAdapter::submit`] (`"actor"`/`"ml"`/`"spark"`);
    /// the fallback path maps one to the other explicitly rather than
    /// assuming they coincide.
    pub fn local_queue(self) -> &'static str {
        match self {
            Tier::Actor => "actor-jobs",
            Tier::Ml => "ml-jobs",
            Tier::Spark => "spark-jobs",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tier::Actor => "actor",
            Tier::Ml => "ml",
            Tier::Spark => "spark",
        }
    }
}

/// Where a classified job should be dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Local,
    Bulk,
}

/// The full routing decision for a job: where to send it, at what tier, and
/// (for `Platform::Local`) the concrete queue name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routing {
    pub platform: Platform,
    pub tier: Tier,
}

impl Routing {
    /// Local destination queue, or `None` for `Platform::Bulk` (no queue — the
    /// job goes to the bulk-compute adapter instead).
    pub fn local_queue(&self) -> Option<&'static str> {
        match self.platform {
            Platform::Local => Some(self.tier.local_queue()),
            Platform::Bulk => None,
        }
    }
}

/// Classifier thresholds and weights, exposed as configuration constants
/// (§4.4) rather than hard literals so they can be tuned without a rebuild
/// of the calling logic — only this struct needs constructing differently.
#[derive(Debug, Clone, Copy)]
pub struct ClassifierThresholds {
    pub ml_threshold: f64,
    pub spark_threshold: f64,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self { ml_threshold: 4.0, spark_threshold: 10.0 }
    }
}

/// Classify a job descriptor into a [`Routing`] decision (§4.4).
///
/// Pure function of `descriptor` and `bulk_available` — no side effects, no
/// hidden state. `latency_sensitive` supersedes cost unconditionally; ties
/// at an exact threshold boundary fall to the lower tier (strict `>`).
pub fn classify(
    descriptor: &JobDescriptor,
    bulk_available: bool,
    thresholds: ClassifierThresholds,
) -> Routing {
    if descriptor.fields.latency_sensitive {
        return Routing { platform: Platform::Local, tier: Tier::Actor };
    }

    let score = descriptor.cost_score();

    if bulk_available {
        if score > thresholds.spark_threshold {
            return Routing { platform: Platform::Bulk, tier: Tier::Spark };
        }
        if score > thresholds.ml_threshold {
            return Routing { platform: Platform::Bulk, tier: Tier::Ml };
        }
    }

    let tier = if score > thresholds.spark_threshold {
        Tier::Spark
    } else if score > thresholds.ml_threshold {
        Tier::Ml
    } else {
        Tier::Actor
    };
    Routing { platform: Platform::Local, tier }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(json: serde_json::Value) -> JobDescriptor {
        JobDescriptor::decode(json.to_string().as_bytes()).expect("valid descriptor")
    }

    // -----------------------------------------------------------------------
    // Literal scenarios (spec §8)
    // -----------------------------------------------------------------------

    #[test]
    fn scenario_1_latency_sensitive_overrides_huge_score() {
        let d = descriptor(serde_json::json!({
            "job_id": "a",
            "payload": {"latency_sensitive": true, "rows": 10_000_000, "priority": "high"}
        }));
        let r = classify(&d, false, ClassifierThresholds::default());
        assert_eq!(r.platform, Platform::Local);
        assert_eq!(r.tier, Tier::Actor);
        assert_eq!(r.local_queue(), Some("actor-jobs"));
    }

    #[test]
    fn scenario_2_small_job_is_actor_tier() {
        let d = descriptor(serde_json::json!({
            "job_id": "b",
            "payload": {"rows": 1000, "estimated_runtime_sec": 10}
        }));
        let score = d.cost_score();
        assert!((score - 0.168).abs() < 0.001, "score = {score}");
        let r = classify(&d, false, ClassifierThresholds::default());
        assert_eq!(r.tier, Tier::Actor);
    }

    #[test]
    fn scenario_3_large_high_priority_job_is_spark_or_bulk_spark() {
        let d = descriptor(serde_json::json!({
            "job_id": "c",
            "payload": {"rows": 10_000_000, "estimated_runtime_sec": 600, "priority": "high"}
        }));
        assert!((d.cost_score() - 40.0).abs() < 1e-9);

        let bulk = classify(&d, true, ClassifierThresholds::default());
        assert_eq!(bulk.platform, Platform::Bulk);
        assert_eq!(bulk.tier, Tier::Spark);

        let local = classify(&d, false, ClassifierThresholds::default());
        assert_eq!(local.platform, Platform::Local);
        assert_eq!(local.tier, Tier::Spark);
        assert_eq!(local.local_queue(), Some("spark-jobs"));
    }

    #[test]
    fn scenario_4_medium_job_is_ml_or_bulk_ml() {
        let d = descriptor(serde_json::json!({
            "job_id": "d",
            "payload": {"rows": 1_000_000, "estimated_runtime_sec": 240}
        }));
        assert!((d.cost_score() - 5.0).abs() < 1e-9);

        let bulk = classify(&d, true, ClassifierThresholds::default());
        assert_eq!(bulk.platform, Platform::Bulk);
        assert_eq!(bulk.tier, Tier::Ml);

        let local = classify(&d, false, ClassifierThresholds::default());
        assert_eq!(local.tier, Tier::Ml);
    }

    // -----------------------------------------------------------------------
    // Invariants (spec §8)
    // -----------------------------------------------------------------------

    #[test]
    fn p2_classify_is_deterministic() {
        let d = descriptor(serde_json::json!({
            "job_id": "x",
            "payload": {"rows": 2_000_000, "estimated_runtime_sec": 300}
        }));
        let thresholds = ClassifierThresholds::default();
        assert_eq!(classify(&d, true, thresholds), classify(&d, true, thresholds));
        assert_eq!(classify(&d, false, thresholds), classify(&d, false, thresholds));
    }

    #[test]
    fn p3_latency_sensitive_always_wins() {
        for bulk_available in [true, false] {
            for (rows, runtime, priority) in [
                (0u64, 0u64, "normal"),
                (50_000_000, 10_000, "high"),
            ] {
                let d = descriptor(serde_json::json!({
                    "job_id": "x",
                    "payload": {
                        "latency_sensitive": true,
                        "rows": rows,
                        "estimated_runtime_sec": runtime,
                        "priority": priority,
                    }
                }));
                let r = classify(&d, bulk_available, ClassifierThresholds::default());
                assert_eq!(r.platform, Platform::Local);
                assert_eq!(r.tier, Tier::Actor);
            }
        }
    }

    #[test]
    fn p4_more_rows_never_moves_tier_down() {
        let thresholds = ClassifierThresholds::default();
        let low = descriptor(serde_json::json!({
            "job_id": "x", "payload": {"rows": 100, "estimated_runtime_sec": 1}
        }));
        let high = descriptor(serde_json::json!({
            "job_id": "x", "payload": {"rows": 50_000_000, "estimated_runtime_sec": 1}
        }));
        assert!(classify(&low, false, thresholds).tier <= classify(&high, false, thresholds).tier);
    }

    #[test]
    fn p4_more_runtime_never_moves_tier_down() {
        let thresholds = ClassifierThresholds::default();
        let low = descriptor(serde_json::json!({
            "job_id": "x", "payload": {"rows": 1, "estimated_runtime_sec": 1}
        }));
        let high = descriptor(serde_json::json!({
            "job_id": "x", "payload": {"rows": 1, "estimated_runtime_sec": 10_000}
        }));
        assert!(classify(&low, false, thresholds).tier <= classify(&high, false, thresholds).tier);
    }

    #[test]
    fn p4_high_priority_never_moves_tier_down() {
        let thresholds = ClassifierThresholds::default();
        let normal = descriptor(serde_json::json!({
            "job_id": "x",
            "payload": {"rows": 1_000_000, "estimated_runtime_sec": 120, "priority": "normal"}
        }));
        let high = descriptor(serde_json::json!({
            "job_id": "x",
            "payload": {"rows": 1_000_000, "estimated_runtime_sec": 120, "priority": "high"}
        }));
        assert!(classify(&normal, false, thresholds).tier <= classify(&high, false, thresholds).tier);
    }

    #[test]
    fn boundary_ties_fall_to_the_lower_tier() {
        // score exactly 4.0 -> actor, not ml (strict `>`)
        let at_ml_boundary = descriptor(serde_json::json!({
            "job_id": "x", "payload": {"rows": 4_000_000, "estimated_runtime_sec": 0}
        }));
        assert!((at_ml_boundary.cost_score() - 4.0).abs() < 1e-9);
        assert_eq!(classify(&at_ml_boundary, false, ClassifierThresholds::default()).tier, Tier::Actor);

        // score exactly 10.0 -> ml, not spark
        let at_spark_boundary = descriptor(serde_json::json!({
            "job_id": "x", "payload": {"rows": 10_000_000, "estimated_runtime_sec": 0}
        }));
        assert!((at_spark_boundary.cost_score() - 10.0).abs() < 1e-9);
        assert_eq!(classify(&at_spark_boundary, false, ClassifierThresholds::default()).tier, Tier::Ml);
    }

    // -----------------------------------------------------------------------
    // Decoding
    // -----------------------------------------------------------------------

    #[test]
    fn decode_rejects_missing_job_id() {
        let err = JobDescriptor::decode(b"{\"payload\": {}}").unwrap_err();
        assert!(matches!(err, DecodeError::MissingJobId));
    }

    #[test]
    fn decode_rejects_empty_job_id() {
        let err = JobDescriptor::decode(b"{\"job_id\": \"\", \"payload\": {}}").unwrap_err();
        assert!(matches!(err, DecodeError::MissingJobId));
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let err = JobDescriptor::decode(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson(_)));
    }

    #[test]
    fn decode_applies_payload_defaults() {
        let d = descriptor(serde_json::json!({"job_id": "e", "payload": {}}));
        assert_eq!(d.fields.rows, 1_000);
        assert_eq!(d.fields.estimated_runtime_sec, 10);
        assert_eq!(d.fields.priority, Priority::Normal);
        assert!(!d.fields.latency_sensitive);
    }

    #[test]
    fn decode_tolerates_missing_payload() {
        let d = descriptor(serde_json::json!({"job_id": "e"}));
        assert_eq!(d.fields.rows, 1_000);
    }

    // -----------------------------------------------------------------------
    // P6: forward fidelity — unknown keys retained in raw_payload.
    //
    // Bit-exact wire forwarding itself is a router-level property (the
    // router forwards the received message bytes verbatim rather than
    // re-serializing through this descriptor) and is asserted there.
    // -----------------------------------------------------------------------

    #[test]
    fn p6_unknown_payload_keys_are_retained_in_raw_payload() {
        let original = serde_json::json!({
            "job_id": "f",
            "payload": {
                "rows": 500,
                "estimated_runtime_sec": 5,
                "totally_unrecognized_key": {"nested": [1, 2, 3]},
            }
        });
        let bytes = original.to_string().into_bytes();
        let d = JobDescriptor::decode(&bytes).unwrap();
        assert_eq!(d.raw_payload, original["payload"]);
    }
}
