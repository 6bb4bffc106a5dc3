//! Broker adapter — abstracts the durable queue the router and controller
//! depend on (§4.1).
//!
//! [`BrokerClient`] is an enum wrapping a concrete implementation chosen at
//! construction time, mirroring the teacher's `BackendClient` enum-dispatch
//! pattern over its provider adapters: all call sites see one API
//! (`receive`, `complete`, `abandon`, `send`, `depth`), and the concrete
//! wire protocol is fully encapsulated in the adapter module.

mod amqp;

pub use amqp::AmqpBroker;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;

/// A received message handle. Exactly one of [`BrokerClient::complete`] or
/// [`BrokerClient::abandon`] must be called on it before it is dropped —
/// this is P1 ("no loss") from the router's point of view.
pub struct BrokerMessage {
    pub body: Vec<u8>,
    pub(crate) delivery_tag: u64,
}

/// Capability set a broker adapter must expose (§4.1, §9 "Adapter
/// polymorphism"). Implemented once per concrete broker; the in-memory
/// test double lives in `#[cfg(test)]` only and is never selected by the
/// boot shell.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    async fn receive(&self, queue: &str, max_wait: Duration) -> Result<Option<BrokerMessage>, BrokerError>;
    async fn complete(&self, msg: BrokerMessage) -> Result<(), BrokerError>;
    async fn abandon(&self, msg: BrokerMessage) -> Result<(), BrokerError>;
    async fn send(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError>;
    /// Best-effort current message count; `Ok(0)` on not-found or any
    /// transient error — depth reporting must never fail the controller
    /// tick for other pairs (§4.6).
    async fn depth(&self, queue: &str) -> u64;
}

/// Enum dispatch over concrete broker implementations, selected once at
/// startup from [`crate::config::Config`].
pub enum BrokerClient {
    Amqp(AmqpBroker),
}

#[async_trait]
impl BrokerAdapter for BrokerClient {
    async fn receive(&self, queue: &str, max_wait: Duration) -> Result<Option<BrokerMessage>, BrokerError> {
        match self {
            Self::Amqp(a) => a.receive(queue, max_wait).await,
        }
    }

    async fn complete(&self, msg: BrokerMessage) -> Result<(), BrokerError> {
        match self {
            Self::Amqp(a) => a.complete(msg).await,
        }
    }

    async fn abandon(&self, msg: BrokerMessage) -> Result<(), BrokerError> {
        match self {
            Self::Amqp(a) => a.abandon(msg).await,
        }
    }

    async fn send(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        match self {
            Self::Amqp(a) => a.send(queue, body).await,
        }
    }

    async fn depth(&self, queue: &str) -> u64 {
        match self {
            Self::Amqp(a) => a.depth(queue).await,
        }
    }
}

/// Open a broker connection with retries, per §4.1/§6/§7: up to
/// `MAX_RETRIES` attempts, `RETRY_DELAY` apart, fatal on exhaustion.
pub async fn open_with_retry(
    broker_url: &str,
    max_retries: u32,
    retry_delay: Duration,
) -> anyhow::Result<BrokerClient> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        tracing::info!(attempt, max_retries, "connecting to broker");
        match AmqpBroker::connect(broker_url).await {
            Ok(broker) => {
                tracing::info!("connected to broker");
                return Ok(BrokerClient::Amqp(broker));
            }
            Err(e) if attempt < max_retries => {
                tracing::warn!(error = %e, attempt, "broker connection failed, retrying");
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                tracing::error!(error = %e, attempt, "broker connection exhausted retries");
                anyhow::bail!("broker connection failed after {attempt} attempts: {e}");
            }
        }
    }
}
