use agrimon_core::error::{MeasurementError, PublishError};
use std::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, std::string::String),
}

#[derive(Debug, Error)]
pub enum DBError {
    #[error(transparent)]
    SQLError(#[from] sqlx::Error),
    #[error(transparent)]
    MigrateError(#[from] sqlx::migrate::MigrateError),
    #[error("Did not find user: {0}")]
    UserNotFound(uuid::Uuid),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Object already exists: {0}")]
    Duplicate(std::string::String),
    #[error("Invalid object path: {0}")]
    InvalidPath(std::string::String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid field: {0}")]
    Measurement(#[from] MeasurementError),
    #[error("Invalid body: {0}")]
    Body(std::string::String),
    #[error("Invalid form data: {0}")]
    Multipart(std::string::String),
    #[error("Failed to upload audio file: {0}")]
    Upload(#[from] StorageError),
    #[error("Failed to insert sensor data: {0}")]
    Insert(#[from] DBError),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized: missing bearer token")]
    MissingCredential,
    #[error("Unauthorized: invalid or expired token")]
    InvalidCredential,
    #[error("Forbidden: {0} access required")]
    Forbidden(std::string::String),
    #[error(transparent)]
    Lookup(#[from] DBError),
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Connecting to {0} timed out")]
    ConnectTimeout(std::string::String),
    #[error("Connection to {0} refused")]
    ConnectRefused(std::string::String),
    #[error("Publishing to {0} timed out")]
    PublishTimeout(std::string::String),
    #[error("Broker rejected the connection: {0:?}")]
    Rejected(rumqttc::ConnectReturnCode),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(std::string::String),
    #[error("Transport error: {0}")]
    Transport(std::string::String),
    #[error("HTTP fallback failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP fallback answered with status {0}")]
    HttpStatus(u16),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(std::string::String),
    #[error("{0}")]
    NotFound(std::string::String),
}

/// Outcome classes of a request handler, each mapping to one status code.
#[derive(Debug, Error)]
#[error(transparent)]
pub enum HandlerError {
    Unauthorized(Box<dyn error::Error + Send + Sync>),
    Forbidden(Box<dyn error::Error + Send + Sync>),
    NotFound(Box<dyn error::Error + Send + Sync>),
    User(Box<dyn error::Error + Send + Sync>),
    Internal(Box<dyn error::Error + Send + Sync>),
}

impl From<DBError> for HandlerError {
    fn from(err: DBError) -> Self {
        match err {
            DBError::UserNotFound(_) => HandlerError::NotFound(Box::from(err)),
            DBError::SQLError(_) | DBError::MigrateError(_) => {
                HandlerError::Internal(Box::from(err))
            }
        }
    }
}

impl From<AuthError> for HandlerError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential | AuthError::InvalidCredential => {
                HandlerError::Unauthorized(Box::from(err))
            }
            AuthError::Forbidden(_) => HandlerError::Forbidden(Box::from(err)),
            AuthError::Lookup(_) => HandlerError::Internal(Box::from(err)),
        }
    }
}

impl From<ApiError> for HandlerError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Validation(_) => HandlerError::User(Box::from(err)),
            ApiError::NotFound(_) => HandlerError::NotFound(Box::from(err)),
        }
    }
}

// Ingest clients only distinguish success from failure
impl From<IngestError> for HandlerError {
    fn from(err: IngestError) -> Self {
        HandlerError::Internal(Box::from(err))
    }
}

impl From<PublishError> for HandlerError {
    fn from(err: PublishError) -> Self {
        HandlerError::User(Box::from(err))
    }
}
