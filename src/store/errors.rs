//! # Store Errors

use thiserror::Error;

use crate::registry::ValidationError;

/// Result type for artifact store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Artifact store errors. None of them leave the store modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Rule with id '{rule_id}' already exists in draft")]
    DuplicateRule { rule_id: String },

    #[error("Rule with id '{rule_id}' not found in draft")]
    RuleNotFound { rule_id: String },

    #[error("Incompatibility pair already exists: ({a}, {b})")]
    DuplicateIncompatibility { a: String, b: String },

    #[error("Fact exclusion group already exists: [{}]", .facts.join(", "))]
    DuplicateFactExclusion { facts: Vec<String> },

    #[error("{collection} index {index} out of range ({})", range_hint(.len))]
    IndexOutOfRange {
        collection: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Candidate changed since verification (revision {verified_revision} verified, draft now at revision {current_revision})")]
    StaleCandidate {
        verified_revision: u64,
        current_revision: u64,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn range_hint(len: &usize) -> String {
    if *len == 0 {
        "collection is empty".to_string()
    } else {
        format!("0..{}", len - 1)
    }
}

impl StoreError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::Validation(e) => e.code(),
            StoreError::DuplicateRule { .. } => "KERNEL_DUPLICATE_RULE",
            StoreError::RuleNotFound { .. } => "KERNEL_RULE_NOT_FOUND",
            StoreError::DuplicateIncompatibility { .. } => "KERNEL_DUPLICATE_INCOMPATIBILITY",
            StoreError::DuplicateFactExclusion { .. } => "KERNEL_DUPLICATE_FACT_EXCLUSION",
            StoreError::IndexOutOfRange { .. } => "KERNEL_INDEX_OUT_OF_RANGE",
            StoreError::StaleCandidate { .. } => "KERNEL_STALE_CANDIDATE",
            StoreError::Internal(_) => "KERNEL_INTERNAL",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Validation(e) => e.status_code(),
            StoreError::DuplicateRule { .. } => 409,
            StoreError::RuleNotFound { .. } => 404,
            StoreError::DuplicateIncompatibility { .. } => 409,
            StoreError::DuplicateFactExclusion { .. } => 409,
            StoreError::IndexOutOfRange { .. } => 404,
            StoreError::StaleCandidate { .. } => 409,
            StoreError::Internal(_) => 500,
        }
    }

    pub(crate) fn lock_poisoned() -> Self {
        StoreError::Internal("Lock poisoned".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            StoreError::DuplicateRule {
                rule_id: "r".into()
            }
            .status_code(),
            409
        );
        assert_eq!(
            StoreError::RuleNotFound {
                rule_id: "r".into()
            }
            .status_code(),
            404
        );
        assert_eq!(StoreError::lock_poisoned().status_code(), 500);
    }

    #[test]
    fn test_index_message_names_range() {
        let err = StoreError::IndexOutOfRange {
            collection: "Incompatibility pair",
            index: 5,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "Incompatibility pair index 5 out of range (0..1)"
        );
        let err = StoreError::IndexOutOfRange {
            collection: "Fact exclusion",
            index: 0,
            len: 0,
        };
        assert!(err.to_string().contains("collection is empty"));
    }
}
