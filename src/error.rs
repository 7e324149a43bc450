//! Error types.
//!
//! [`ApiError`] is what a controller returns; it knows its HTTP shape.
//! [`Error`] surfaces process-level failures: bad configuration, a store
//! that cannot be opened, a port that cannot be bound.

use thiserror::Error;
use tracing::{debug, error};

use crate::config::ConfigError;
use crate::response::{IntoResponse, Response};
use crate::status::Status;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Validation(msg) => Response::error(Status::BadRequest, msg),
            ApiError::NotFound(msg) => {
                debug!("{msg}");
                Response::error(Status::NotFound, msg)
            }
            ApiError::Store(e) => {
                error!(error = %e, "store operation failed");
                Response::error(Status::InternalServerError, "database error")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}
