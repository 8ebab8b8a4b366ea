//! AMQP message bus adapter for the transcoding orchestrator.
//!
//! Declares the direct work queue and the progress/results topic exchanges,
//! publishes JSON payloads, and hands back `lapin` consumers bound to each
//! queue. Connection loss is retried transparently on the next operation.

pub mod adapter;
pub mod config;
pub mod error;

pub use adapter::{
    MessageBusAdapter, PROGRESS_BINDING_PATTERN, PROGRESS_EXCHANGE, PROGRESS_QUEUE_BASE,
    PROGRESS_ROUTING_KEY, RESULTS_BINDING_PATTERN, RESULTS_EXCHANGE, RESULTS_QUEUE_BASE,
    RESULTS_ROUTING_KEY, WORK_QUEUE,
};
pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult};
