//! Kubernetes-backed orchestrator adapter.
//!
//! Patches `Deployment.spec.replicas` via a strategic merge patch. Uses
//! whichever credential `kube::Client::try_default` resolves (in-cluster
//! service account when running inside a pod, otherwise the local
//! kubeconfig) — the adapter itself is agnostic to which.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    api::{Api, Patch, PatchParams},
    Client,
};
use serde_json::json;

use super::OrchestratorAdapter;
use crate::error::OrchestratorError;

pub struct KubeOrchestrator {
    deployments: Api<Deployment>,
}

impl KubeOrchestrator {
    pub async fn connect(namespace: &str) -> anyhow::Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { deployments: Api::namespaced(client, namespace) })
    }
}

#[async_trait]
impl OrchestratorAdapter for KubeOrchestrator {
    async fn get_replicas(&self, deployment: &str) -> Result<i32, OrchestratorError> {
        let dep = self
            .deployments
            .get(deployment)
            .await
            .map_err(|e| OrchestratorError::Read { deployment: deployment.to_string(), source: e.into() })?;

        Ok(dep.spec.and_then(|s| s.replicas).unwrap_or(0))
    }

    async fn set_replicas(&self, deployment: &str, n: i32) -> Result<(), OrchestratorError> {
        let current = self.get_replicas(deployment).await?;
        if current == n {
            // Idempotent no-op — avoids API churn (§4.2).
            return Ok(());
        }

        let patch = json!({ "spec": { "replicas": n } });
        self.deployments
            .patch(deployment, &PatchParams::apply("cost-router"), &Patch::Merge(&patch))
            .await
            .map_err(|e| OrchestratorError::Patch { deployment: deployment.to_string(), source: e.into() })?;
        Ok(())
    }
}
