//! Domain services: gateways to the object store and spreadsheet, the
//! relational repository, and the submission/archive/admin workflows.

pub mod admin;
pub mod archive;
pub mod auth;
pub mod local_store;
pub mod object_store;
pub mod repository;
pub mod s3_store;
pub mod sheets;
pub mod submission;

#[cfg(test)]
pub mod testing;

use thiserror::Error;

use object_store::StoreError;
use sheets::SheetError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    EmptySet(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        ServiceError::Upstream(err.to_string())
    }
}

impl From<SheetError> for ServiceError {
    fn from(err: SheetError) -> Self {
        ServiceError::Upstream(err.to_string())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
