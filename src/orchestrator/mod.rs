//! Orchestrator adapter — abstracts the cluster scheduler the elasticity
//! controller patches replica counts against (§4.2).

mod kube_adapter;

pub use kube_adapter::KubeOrchestrator;

use async_trait::async_trait;

use crate::error::OrchestratorError;

/// Capability set an orchestrator adapter must expose (§4.2, §9 "Adapter
/// polymorphism").
#[async_trait]
pub trait OrchestratorAdapter: Send + Sync {
    async fn get_replicas(&self, deployment: &str) -> Result<i32, OrchestratorError>;

    /// Idempotent patch. Implementations must skip the write when
    /// `n == current` — the controller always calls this after comparing,
    /// but the adapter re-checks to stay safe if called directly.
    async fn set_replicas(&self, deployment: &str, n: i32) -> Result<(), OrchestratorError>;
}

/// Enum dispatch over concrete orchestrator implementations.
pub enum OrchestratorClient {
    Kube(KubeOrchestrator),
}

#[async_trait]
impl OrchestratorAdapter for OrchestratorClient {
    async fn get_replicas(&self, deployment: &str) -> Result<i32, OrchestratorError> {
        match self {
            Self::Kube(k) => k.get_replicas(deployment).await,
        }
    }

    async fn set_replicas(&self, deployment: &str, n: i32) -> Result<(), OrchestratorError> {
        match self {
            Self::Kube(k) => k.set_replicas(deployment, n).await,
        }
    }
}
