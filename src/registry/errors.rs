//! # Validation Errors

use thiserror::Error;

/// Result type for boundary validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Input rejected before any mutation is admitted.
///
/// Every variant names the offending token, field or identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown fact token(s): {}", .tokens.join(", "))]
    UnknownFactTokens { tokens: Vec<String> },

    #[error("Unknown action token: {token}")]
    UnknownActionToken { token: String },

    #[error("Malformed outcome '{outcome}': expected Kind(Action) with Kind in Obligated, Allowed, Disallowed, Rejected")]
    MalformedOutcome { outcome: String },

    #[error("Outcome '{outcome}' names an unknown action token: {action}")]
    UnknownOutcomeAction { outcome: String, action: String },

    #[error("Field '{field}' must not be empty")]
    EmptyIdentifier { field: &'static str },

    #[error("Field '{field}' must contain at least one token")]
    EmptyTokenSet { field: &'static str },

    #[error("Duplicate rule_id(s) in input: {}", .ids.join(", "))]
    DuplicateRuleIds { ids: Vec<String> },

    #[error("Action {action} cannot be declared incompatible with itself")]
    SelfIncompatibility { action: String },
}

impl ValidationError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownFactTokens { .. } => "KERNEL_UNKNOWN_FACT_TOKEN",
            ValidationError::UnknownActionToken { .. } => "KERNEL_UNKNOWN_ACTION_TOKEN",
            ValidationError::MalformedOutcome { .. } => "KERNEL_MALFORMED_OUTCOME",
            ValidationError::UnknownOutcomeAction { .. } => "KERNEL_UNKNOWN_OUTCOME_ACTION",
            ValidationError::EmptyIdentifier { .. } => "KERNEL_EMPTY_IDENTIFIER",
            ValidationError::EmptyTokenSet { .. } => "KERNEL_EMPTY_TOKEN_SET",
            ValidationError::DuplicateRuleIds { .. } => "KERNEL_DUPLICATE_RULE_IDS",
            ValidationError::SelfIncompatibility { .. } => "KERNEL_SELF_INCOMPATIBILITY",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        422
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ValidationError::UnknownFactTokens {
            tokens: vec!["Dx.Nope".into(), "Ctx.Nope".into()],
        };
        assert!(err.to_string().contains("Dx.Nope, Ctx.Nope"));
        assert_eq!(err.status_code(), 422);

        let err = ValidationError::EmptyIdentifier { field: "rule_id" };
        assert!(err.to_string().contains("rule_id"));
        assert_eq!(err.code(), "KERNEL_EMPTY_IDENTIFIER");
    }
}
