//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("job store error: {0}")]
    Store(#[from] transcoder_store::StoreError),

    #[error("blob store error: {0}")]
    Storage(#[from] transcoder_storage::StorageError),

    #[error("broker error: {0}")]
    Broker(#[from] transcoder_broker::BrokerError),

    #[error("message decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
