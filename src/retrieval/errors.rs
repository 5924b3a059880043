use thiserror::Error;

use crate::registry::ValidationError;
use crate::store::{StoreError, VerificationState};

pub type RetrievalResult<T> = Result<T, RetrievalError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("Runtime ruleset is not verified (status: {}). Publish a snapshot with verification enabled to activate it.", .status.as_str())]
    NotVerified { status: VerificationState },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RetrievalError {
    pub fn code(&self) -> &'static str {
        match self {
            RetrievalError::NotVerified { .. } => "KERNEL_RUNTIME_NOT_VERIFIED",
            RetrievalError::Validation(e) => e.code(),
            RetrievalError::Store(e) => e.code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            RetrievalError::NotVerified { .. } => 412,
            RetrievalError::Validation(e) => e.status_code(),
            RetrievalError::Store(e) => e.status_code(),
        }
    }
}
