//! AMQP message bus adapter: topology declaration, publish, and consume.

use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer, ExchangeKind};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};

pub const WORK_QUEUE: &str = "transcoding_jobs";
pub const PROGRESS_EXCHANGE: &str = "progress_logs";
pub const PROGRESS_QUEUE_BASE: &str = "transcoding_progress";
pub const PROGRESS_ROUTING_KEY: &str = "transcoding_progress.update";
pub const PROGRESS_BINDING_PATTERN: &str = "transcoding_progress.*";
pub const RESULTS_EXCHANGE: &str = "results_logs";
pub const RESULTS_QUEUE_BASE: &str = "transcoding_results";
pub const RESULTS_ROUTING_KEY: &str = "transcoding_results.update";
pub const RESULTS_BINDING_PATTERN: &str = "transcoding_results.*";

/// Declares work/progress/result topology, publishes, and consumes.
/// Reconnects transparently on the next call after the underlying
/// connection is lost; callers never see an error during a successful
/// reconnect.
pub struct MessageBusAdapter {
    config: BrokerConfig,
    /// Optional suffix (e.g. a worker's five-character id) appended to this
    /// adapter's private progress/result queue names.
    queue_suffix: Option<String>,
    connection: RwLock<Option<Connection>>,
}

impl MessageBusAdapter {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            queue_suffix: None,
            connection: RwLock::new(None),
        }
    }

    pub fn with_queue_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.queue_suffix = Some(suffix.into());
        self
    }

    fn progress_queue_name(&self) -> String {
        match &self.queue_suffix {
            Some(suffix) => format!("{PROGRESS_QUEUE_BASE}.{suffix}"),
            None => PROGRESS_QUEUE_BASE.to_string(),
        }
    }

    fn results_queue_name(&self) -> String {
        match &self.queue_suffix {
            Some(suffix) => format!("{RESULTS_QUEUE_BASE}.{suffix}"),
            None => RESULTS_QUEUE_BASE.to_string(),
        }
    }

    /// Connect with retry (twelve attempts, five-second interval by
    /// default) and declare topology. Call once at startup; subsequent
    /// operations reconnect transparently if the connection drops.
    pub async fn connect(&self) -> BrokerResult<()> {
        let conn = self.connect_with_retry().await?;
        self.declare_topology(&conn).await?;
        *self.connection.write().await = Some(conn);
        Ok(())
    }

    async fn connect_with_retry(&self) -> BrokerResult<Connection> {
        let uri = self.config.amqp_uri();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Connection::connect(&uri, ConnectionProperties::default()).await {
                Ok(conn) => {
                    info!("connected to broker after {} attempt(s)", attempt);
                    return Ok(conn);
                }
                Err(e) => {
                    if attempt >= self.config.connect_retries {
                        return Err(BrokerError::BrokerUnavailable(format!(
                            "exhausted {} connect attempts: {e}",
                            self.config.connect_retries
                        )));
                    }
                    warn!(
                        "broker connect attempt {}/{} failed: {e}, retrying in {}s",
                        attempt, self.config.connect_retries, self.config.connect_retry_interval_secs
                    );
                    tokio::time::sleep(Duration::from_secs(self.config.connect_retry_interval_secs)).await;
                }
            }
        }
    }

    async fn declare_topology(&self, conn: &Connection) -> BrokerResult<()> {
        let channel = conn.create_channel().await?;

        channel
            .queue_declare(WORK_QUEUE, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await?;

        for (exchange, queue_name, routing_pattern) in [
            (PROGRESS_EXCHANGE, self.progress_queue_name(), PROGRESS_BINDING_PATTERN),
            (RESULTS_EXCHANGE, self.results_queue_name(), RESULTS_BINDING_PATTERN),
        ] {
            channel
                .exchange_declare(
                    exchange,
                    ExchangeKind::Topic,
                    ExchangeDeclareOptions { durable: true, ..Default::default() },
                    FieldTable::default(),
                )
                .await?;
            channel
                .queue_declare(&queue_name, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
                .await?;
            channel
                .queue_bind(&queue_name, exchange, routing_pattern, QueueBindOptions::default(), FieldTable::default())
                .await?;
        }

        Ok(())
    }

    /// Returns a channel on a live connection, reconnecting (with the same
    /// retry policy) if the connection has dropped.
    async fn channel(&self) -> BrokerResult<Channel> {
        {
            let guard = self.connection.read().await;
            if let Some(conn) = guard.as_ref() {
                if conn.status().connected() {
                    return Ok(conn.create_channel().await?);
                }
            }
        }

        warn!("broker connection lost, reconnecting");
        let conn = self.connect_with_retry().await?;
        self.declare_topology(&conn).await?;
        let channel = conn.create_channel().await?;
        *self.connection.write().await = Some(conn);
        Ok(channel)
    }

    /// Publish a JSON payload to the direct work queue via the default
    /// exchange.
    pub async fn publish_work(&self, payload: &impl Serialize) -> BrokerResult<()> {
        self.publish("", WORK_QUEUE, payload).await
    }

    pub async fn publish_progress(&self, payload: &impl Serialize) -> BrokerResult<()> {
        self.publish(PROGRESS_EXCHANGE, PROGRESS_ROUTING_KEY, payload).await
    }

    pub async fn publish_result(&self, payload: &impl Serialize) -> BrokerResult<()> {
        self.publish(RESULTS_EXCHANGE, RESULTS_ROUTING_KEY, payload).await
    }

    pub async fn publish(&self, exchange: &str, routing_key: &str, payload: &impl Serialize) -> BrokerResult<()> {
        let body = serde_json::to_vec(payload)?;
        let channel = self.channel().await?;
        channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_content_type("application/json".into()),
            )
            .await
            .map_err(|e| BrokerError::publish_failed(e.to_string()))?
            .await
            .map_err(|e| BrokerError::publish_failed(e.to_string()))?;
        Ok(())
    }

    /// Used by the readiness probe: obtaining a channel forces a fresh
    /// connection if the cached one has dropped.
    pub async fn check_connectivity(&self) -> BrokerResult<()> {
        self.channel().await?;
        Ok(())
    }

    /// Consume from the work queue with prefetch = 1, as the worker does.
    pub async fn consume_work(&self, consumer_tag: &str) -> BrokerResult<Consumer> {
        self.consume(WORK_QUEUE, consumer_tag, Some(1)).await
    }

    pub async fn consume_progress(&self, consumer_tag: &str) -> BrokerResult<Consumer> {
        self.consume(&self.progress_queue_name(), consumer_tag, None).await
    }

    pub async fn consume_results(&self, consumer_tag: &str) -> BrokerResult<Consumer> {
        self.consume(&self.results_queue_name(), consumer_tag, None).await
    }

    async fn consume(&self, queue: &str, consumer_tag: &str, prefetch: Option<u16>) -> BrokerResult<Consumer> {
        let channel = self.channel().await?;
        if let Some(count) = prefetch {
            channel
                .basic_qos(count, lapin::options::BasicQosOptions::default())
                .await?;
        }
        let consumer = channel
            .basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(|e| BrokerError::consume_failed(e.to_string()))?;
        Ok(consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_names_include_suffix_when_present() {
        let adapter = MessageBusAdapter::new(BrokerConfig::from_env()).with_queue_suffix("ab12c");
        assert_eq!(adapter.progress_queue_name(), "transcoding_progress.ab12c");
        assert_eq!(adapter.results_queue_name(), "transcoding_results.ab12c");
    }

    #[test]
    fn queue_names_are_canonical_without_suffix() {
        let adapter = MessageBusAdapter::new(BrokerConfig::from_env());
        assert_eq!(adapter.progress_queue_name(), PROGRESS_QUEUE_BASE);
        assert_eq!(adapter.results_queue_name(), RESULTS_QUEUE_BASE);
    }
}
