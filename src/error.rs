//! Structured error types per adapter (§4.1–§4.3, §7).
//!
//! Each adapter has its own `thiserror`-derived enum rather than a single
//! catch-all type — call sites match on the concrete type they depend on,
//! and every variant here is actually constructed by its adapter (no
//! speculative variants for failure modes that can't occur yet).

/// Errors from the broker adapter (§4.1, §7).
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("receive from `{queue}` failed: {source}")]
    Receive { queue: String, #[source] source: anyhow::Error },
    #[error("send to `{queue}` failed: {source}")]
    Send { queue: String, #[source] source: anyhow::Error },
    #[error("ack/nack failed: {0}")]
    Ack(#[source] anyhow::Error),
}

/// Errors from the orchestrator adapter (§4.2, §7).
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("reading replica count for `{deployment}` failed: {source}")]
    Read { deployment: String, #[source] source: anyhow::Error },
    #[error("patching replica count for `{deployment}` failed: {source}")]
    Patch { deployment: String, #[source] source: anyhow::Error },
}

/// Errors from the bulk-compute adapter (§4.3, §7). Always soft: the
/// router falls back to the local queue on any variant here.
#[derive(Debug, thiserror::Error)]
pub enum BulkComputeError {
    #[error("bulk-compute submission failed: {0}")]
    Submit(#[source] anyhow::Error),
}

/// Fatal configuration problems detected at startup (§7, §9).
///
/// Distinguishing `Missing` from `Invalid` lets the boot shell print an
/// actionable message (which variable, and why) before exiting non-zero.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),
    #[error("invalid value for `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("failed to read topology override file {path}: {source}")]
    TopologyFile { path: String, #[source] source: anyhow::Error },
    #[error("invalid topology override: {0}")]
    TopologyInvalid(String),
}
