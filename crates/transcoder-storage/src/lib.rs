//! Blob store client for transcoding input/output artifacts.
//!
//! A thin wrapper over an S3-compatible SDK: upload, download, presign,
//! existence check, delete, and a connectivity probe. Used by the HTTP
//! surface's upload/download endpoints and by the Worker Runner's
//! download/upload steps.

pub mod client;
pub mod error;

pub use client::{BlobStoreClient, BlobStoreConfig};
pub use error::{StorageError, StorageResult};
