//! Broker error types.

use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable after exhausting connect retries: {0}")]
    BrokerUnavailable(String),

    #[error("publish failed: {0}")]
    PublishFailed(String),

    #[error("consume failed: {0}")]
    ConsumeFailed(String),

    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrokerError {
    pub fn publish_failed(msg: impl Into<String>) -> Self {
        Self::PublishFailed(msg.into())
    }

    pub fn consume_failed(msg: impl Into<String>) -> Self {
        Self::ConsumeFailed(msg.into())
    }
}
