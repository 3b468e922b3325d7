//! Object store gateway: a key/value blob interface with presigned reads.
//!
//! Implementations hold no request state and never retry; a failed call is
//! final for the item it concerns.

use async_trait::async_trait;
use bytes::Bytes;
use std::{io, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("presign failed: {0}")]
    Presign(String),
    #[error("object store request failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, recording `content_type` when given.
    async fn put(&self, key: &str, data: Bytes, content_type: Option<&str>) -> StoreResult<()>;

    /// Read the full payload stored under `key`.
    async fn get(&self, key: &str) -> StoreResult<Bytes>;

    /// Remove `key`. Missing objects are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// A URL granting read access to `key` for `ttl`.
    async fn presign(&self, key: &str, ttl: Duration) -> StoreResult<String>;

    /// Backend name, for logs and readiness output.
    fn kind(&self) -> &'static str;
}
