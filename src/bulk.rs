//! Bulk-compute adapter — submission to an external heavy-compute service
//! (§4.3). Optional: constructed only when all three `BULK_ACCOUNT_*`
//! environment variables are present (§6); absence disables bulk dispatch
//! with no error, per the classifier's `bulk_available` flag.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::BulkComputeError;

/// Credentials and endpoint for the external bulk-compute service.
#[derive(Debug, Clone)]
pub struct BulkComputeCredentials {
    pub account_name: String,
    pub account_key: String,
    pub url: String,
}

impl BulkComputeCredentials {
    /// All three of `BULK_ACCOUNT_NAME`, `BULK_ACCOUNT_KEY`, and
    /// `BULK_ACCOUNT_URL` are required together; if any is missing the
    /// adapter is simply absent (§6) — this is not a configuration error.
    pub fn from_env() -> Option<Self> {
        let account_name = std::env::var("BULK_ACCOUNT_NAME").ok().filter(|s| !s.is_empty())?;
        let account_key = std::env::var("BULK_ACCOUNT_KEY").ok().filter(|s| !s.is_empty())?;
        let url = std::env::var("BULK_ACCOUNT_URL").ok().filter(|s| !s.is_empty())?;
        Some(Self { account_name, account_key, url })
    }
}

/// Response identifying the job on the external service.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSubmission {
    pub external_job_id: String,
}

/// HTTP client adapter for the bulk-compute service.
pub struct BulkComputeAdapter {
    client: Client,
    base_url: String,
    account_name: String,
}

impl BulkComputeAdapter {
    pub fn new(credentials: BulkComputeCredentials) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: credentials.url.trim_end_matches('/').to_string(),
            account_name: credentials.account_name,
        })
    }

    /// Construct an adapter from the environment, or `None` if bulk dispatch
    /// is not configured.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        match BulkComputeCredentials::from_env() {
            Some(creds) => Ok(Some(Self::new(creds)?)),
            None => Ok(None),
        }
    }

    /// Submit a job at the given tier label (`"actor"` | `"ml"` | `"spark"`
    /// — distinct from the local-queue suffix convention, see
    /// [`crate::classify::Tier::local_queue`]).
    pub async fn submit(&self, job_id: &str, payload: &Value, tier: &str) -> Result<BulkSubmission, BulkComputeError> {
        let url = format!("{}/jobs", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("X-Account-Name", &self.account_name)
            .json(&serde_json::json!({
                "job_id": job_id,
                "payload": payload,
                "tier": tier,
            }))
            .send()
            .await
            .map_err(|e| BulkComputeError::Submit(e.into()))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| BulkComputeError::Submit(e.into()))?;

        if !status.is_success() {
            return Err(BulkComputeError::Submit(anyhow::anyhow!(
                "bulk-compute service returned HTTP {status}: {text}"
            )));
        }

        serde_json::from_str(&text)
            .map_err(|e| BulkComputeError::Submit(anyhow::anyhow!("parsing bulk-compute response: {e}")))
    }
}
