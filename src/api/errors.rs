//! API errors
//!
//! API errors are pass-through: they keep the stable code and status of
//! the subsystem error they wrap. Only malformed envelopes and unknown
//! operations originate here.

use std::fmt;

use crate::config::ConfigError;
use crate::publish::PublishError;
use crate::registry::ValidationError;
use crate::retrieval::RetrievalError;
use crate::snapshot::SnapshotError;
use crate::store::StoreError;

/// Error codes owned by the API layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// Request is not valid JSON or is missing required fields
    InvalidRequest,
    /// `op` names no known operation
    UnknownOperation,
    /// Response data could not be serialized
    Internal,
}

impl ApiErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidRequest => "KERNEL_INVALID_REQUEST",
            ApiErrorCode::UnknownOperation => "KERNEL_UNKNOWN_OPERATION",
            ApiErrorCode::Internal => "KERNEL_INTERNAL",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiErrorCode::InvalidRequest | ApiErrorCode::UnknownOperation => 400,
            ApiErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Error reported in a response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    code: String,
    message: String,
    status: u16,
}

impl ApiError {
    fn new(code: impl Into<String>, message: impl Into<String>, status: u16) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status,
        }
    }

    fn owned(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self::new(code.code(), message, code.status_code())
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::owned(ApiErrorCode::InvalidRequest, reason)
    }

    pub fn unknown_operation(op: &str) -> Self {
        Self::owned(
            ApiErrorCode::UnknownOperation,
            format!("Unknown operation: {}", op),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::owned(ApiErrorCode::Internal, message)
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP-like status for collaborators that front the kernel over HTTP.
    pub fn status(&self) -> u16 {
        self.status
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::new(err.code(), err.to_string(), err.status_code())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::new(err.code(), err.to_string(), err.status_code())
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        Self::new(err.code(), err.to_string(), err.status_code())
    }
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        Self::new(err.code(), err.to_string(), err.status_code())
    }
}

impl From<SnapshotError> for ApiError {
    fn from(err: SnapshotError) -> Self {
        Self::new(err.code().code(), err.to_string(), err.status_code())
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::new("KERNEL_CONFIG_ERROR", err.to_string(), 500)
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
