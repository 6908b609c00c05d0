//! Client error types

use crate::observer::Operation;
use ossfs_signer::SigningError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors raised by the HTTP transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// The request did not finish within the configured timeout
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// The request could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport failure
    #[error("HTTP transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Signature computation failed
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// The request never produced a response
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// A response body could not be parsed
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// The service answered with an unexpected status
    #[error("{operation} failed with HTTP {status}: {message}")]
    Service {
        operation: Operation,
        status: u16,
        code: Option<String>,
        message: String,
        request_id: Option<String>,
        body: String,
    },

    /// Object (or multipart upload) not found
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// A caller-supplied argument was rejected before sending
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A move copied the object but could not delete the source
    #[error("move of {source_key} to {destination_key} left the source in place: {source}")]
    MoveIncomplete {
        source_key: String,
        destination_key: String,
        source: Box<ClientError>,
    },
}

impl ClientError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP status of a service error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Service error code, e.g. `AccessDenied`
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Request id reported by the service, when one was received
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Service { request_id, .. } => request_id.as_deref(),
            Self::MoveIncomplete { source, .. } => source.request_id(),
            _ => None,
        }
    }

    /// Check if retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(TransportError::Timeout(_) | TransportError::Connect(_)) => true,
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
