//! AMQP-backed broker adapter (RabbitMQ or compatible).
//!
//! Durability is enforced at the protocol level: queues are declared
//! durable, publishes are marked persistent (`delivery_mode = 2`), and
//! messages are only ack'd after the corresponding downstream publish has
//! been confirmed — never before (§4.5, §9 "at-least-once semantics").

use std::time::{Duration, Instant};

use async_trait::async_trait;
use lapin::{
    options::{
        BasicAckOptions, BasicGetOptions, BasicNackOptions, BasicPublishOptions,
        QueueDeclareOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};

use super::{BrokerAdapter, BrokerMessage};
use crate::error::BrokerError;

/// Gap between empty `basic_get` polls while waiting out `max_wait`.
///
/// RabbitMQ has no native long-poll `get`; `receive` approximates one by
/// polling at this interval, which keeps idle CPU usage negligible while
/// staying well under the 5s `max_wait` the router relies on.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct AmqpBroker {
    _connection: Connection,
    channel: Channel,
}

impl AmqpBroker {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow::anyhow!("AMQP connect to {url}: {e}"))?;
        let channel = connection.create_channel().await.map_err(|e| anyhow::anyhow!("create channel: {e}"))?;
        Ok(Self { _connection: connection, channel })
    }

    async fn declare(&self, queue: &str) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| BrokerError::Send { queue: queue.to_string(), source: e.into() })?;
        Ok(())
    }
}

#[async_trait]
impl BrokerAdapter for AmqpBroker {
    async fn receive(&self, queue: &str, max_wait: Duration) -> Result<Option<BrokerMessage>, BrokerError> {
        self.declare(queue).await?;
        let deadline = Instant::now() + max_wait;

        loop {
            let get = self
                .channel
                .basic_get(queue, BasicGetOptions::default())
                .await
                .map_err(|e| BrokerError::Receive { queue: queue.to_string(), source: e.into() })?;

            if let Some(message) = get {
                let delivery_tag = message.delivery.delivery_tag;
                return Ok(Some(BrokerMessage { body: message.delivery.data, delivery_tag }));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
        }
    }

    async fn complete(&self, msg: BrokerMessage) -> Result<(), BrokerError> {
        self.channel
            .basic_ack(msg.delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| BrokerError::Ack(e.into()))
    }

    async fn abandon(&self, msg: BrokerMessage) -> Result<(), BrokerError> {
        self.channel
            .basic_nack(msg.delivery_tag, BasicNackOptions { requeue: true, ..Default::default() })
            .await
            .map_err(|e| BrokerError::Ack(e.into()))
    }

    async fn send(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        self.declare(queue).await?;
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| BrokerError::Send { queue: queue.to_string(), source: e.into() })?
            .await
            .map_err(|e| BrokerError::Send { queue: queue.to_string(), source: e.into() })?;
        Ok(())
    }

    async fn depth(&self, queue: &str) -> u64 {
        let declared = self
            .channel
            .queue_declare(
                queue,
                QueueDeclareOptions { durable: true, passive: true, ..Default::default() },
                FieldTable::default(),
            )
            .await;

        match declared {
            Ok(q) => q.message_count() as u64,
            Err(e) => {
                tracing::debug!(queue, error = %e, "depth query failed — reporting 0");
                0
            }
        }
    }
}
