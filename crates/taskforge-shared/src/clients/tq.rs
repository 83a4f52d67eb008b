//! Task Queue and Log Bus clients over AMQP 0.9.1 (RabbitMQ), grounded on
//! `original_source/core/utils.py::RabbitMQClient`: a topic exchange +
//! durable queue for tasks, a direct exchange + durable queue for logs.
//!
//! Deliberately absent: anything resembling the source's
//! `remove_task_from_queue` (drain-and-republish to excise one message).
//! spec.md §9 flags that as an anti-pattern; this client exposes only
//! publish/consume/ack/reject-requeue.

use std::future::Future;
use std::sync::Arc;

use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use futures::StreamExt;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::error::TaskforgeResult;
use crate::models::{LogEvent, TaskEnvelope};

const TASK_EXCHANGE: &str = "task_exchange";
const TASK_QUEUE: &str = "task_queue";
const LOG_EXCHANGE: &str = "log_exchange";
const LOG_QUEUE: &str = "log_queue";
const LOG_ROUTING_KEY: &str = "log";

/// Outcome a consumer handler reports for one delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Ack,
    RejectRequeue,
    RejectNoRequeue,
}

pub struct MessageBroker {
    connection: Arc<Connection>,
}

impl MessageBroker {
    pub async fn connect(amqp_url: &str) -> TaskforgeResult<Self> {
        let connection =
            Connection::connect(amqp_url, ConnectionProperties::default()).await?;
        Ok(Self {
            connection: Arc::new(connection),
        })
    }

    pub async fn task_queue(&self) -> TaskforgeResult<TaskQueueClient> {
        let channel = self.connection.create_channel().await?;
        channel
            .exchange_declare(
                TASK_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                TASK_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                TASK_QUEUE,
                TASK_EXCHANGE,
                "#",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(TaskQueueClient { channel })
    }

    pub async fn log_bus(&self) -> TaskforgeResult<LogBusClient> {
        let channel = self.connection.create_channel().await?;
        channel
            .exchange_declare(
                LOG_EXCHANGE,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_declare(
                LOG_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                LOG_QUEUE,
                LOG_EXCHANGE,
                LOG_ROUTING_KEY,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
        Ok(LogBusClient { channel })
    }
}

pub struct TaskQueueClient {
    channel: Channel,
}

impl TaskQueueClient {
    /// Reachability probe for `/health`: a passive declare of the task
    /// queue, which succeeds without mutating anything as long as the
    /// channel's connection to RabbitMQ is alive.
    pub async fn health_check(&self) -> bool {
        self.channel
            .queue_declare(
                TASK_QUEUE,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .is_ok()
    }

    pub async fn publish(&self, envelope: &TaskEnvelope) -> TaskforgeResult<()> {
        let body = serde_json::to_vec(envelope)?;
        self.channel
            .basic_publish(
                TASK_EXCHANGE,
                &envelope.task_type,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }

    /// Consume with the given prefetch, invoking `handler` for each
    /// delivery and acking/rejecting per its returned `ConsumeOutcome`.
    /// Runs until the channel closes or an unrecoverable transport error
    /// occurs.
    pub async fn consume<F, Fut>(&self, prefetch: u16, consumer_tag: &str, handler: F) -> TaskforgeResult<()>
    where
        F: Fn(TaskEnvelope) -> Fut,
        Fut: Future<Output = ConsumeOutcome>,
    {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await?;
        let mut consumer = self
            .channel
            .basic_consume(
                TASK_QUEUE,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let outcome = match serde_json::from_slice::<TaskEnvelope>(&delivery.data) {
                Ok(envelope) => handler(envelope).await,
                Err(e) => {
                    tracing::error!(error = %e, "malformed task envelope, discarding");
                    ConsumeOutcome::RejectNoRequeue
                }
            };
            match outcome {
                ConsumeOutcome::Ack => delivery.ack(BasicAckOptions::default()).await?,
                ConsumeOutcome::RejectRequeue => {
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        })
                        .await?
                }
                ConsumeOutcome::RejectNoRequeue => {
                    delivery
                        .nack(BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        })
                        .await?
                }
            }
        }
        Ok(())
    }
}

pub struct LogBusClient {
    channel: Channel,
}

impl LogBusClient {
    /// Fire-and-forget publish. Per spec.md §4.4, emission failures never
    /// propagate into the data plane; callers should log and ignore the
    /// returned error rather than fail a request on it.
    pub async fn publish(&self, event: &LogEvent) -> TaskforgeResult<()> {
        let body = serde_json::to_vec(event)?;
        self.channel
            .basic_publish(
                LOG_EXCHANGE,
                LOG_ROUTING_KEY,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_constants_match_source() {
        assert_eq!(TASK_EXCHANGE, "task_exchange");
        assert_eq!(TASK_QUEUE, "task_queue");
        assert_eq!(LOG_EXCHANGE, "log_exchange");
        assert_eq!(LOG_QUEUE, "log_queue");
        assert_eq!(LOG_ROUTING_KEY, "log");
    }
}
