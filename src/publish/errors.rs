//! # Publication Errors

use thiserror::Error;

use crate::conflict::ConflictWarning;
use crate::snapshot::SnapshotError;
use crate::store::StoreError;

pub type PublishResult<T> = Result<T, PublishError>;

/// Reasons a publication was aborted.
///
/// Verification failures are not errors: they come back inside a
/// successful `PublishReport` with `runtime_promoted == false`.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publication blocked by {} unresolvable conflict(s): {}", .conflicts.len(), describe_all(.conflicts))]
    UnresolvableConflicts { conflicts: Vec<ConflictWarning> },

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn describe_all(conflicts: &[ConflictWarning]) -> String {
    conflicts
        .iter()
        .map(ConflictWarning::describe)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PublishError {
    pub fn code(&self) -> &'static str {
        match self {
            PublishError::UnresolvableConflicts { .. } => "KERNEL_UNRESOLVABLE_CONFLICTS",
            PublishError::Snapshot(e) => e.code().code(),
            PublishError::Store(e) => e.code(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            PublishError::UnresolvableConflicts { .. } => 409,
            PublishError::Snapshot(e) => e.status_code(),
            PublishError::Store(e) => e.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_error_names_rules() {
        let err = PublishError::UnresolvableConflicts {
            conflicts: vec![ConflictWarning {
                rule_a_id: "r1".into(),
                rule_b_id: "r2".into(),
                action: "Action.X".into(),
                verdict_a: "Obligated(Action.X)".into(),
                verdict_b: "Rejected(Action.X)".into(),
                resolvable: false,
            }],
        };
        assert_eq!(err.status_code(), 409);
        let message = err.to_string();
        assert!(message.contains("1 unresolvable"));
        assert!(message.contains("r1 [Obligated(Action.X)] vs r2 [Rejected(Action.X)]"));
    }

    #[test]
    fn test_store_error_passes_code_through() {
        let err = PublishError::from(StoreError::StaleCandidate {
            verified_revision: 2,
            current_revision: 3,
        });
        assert_eq!(err.code(), "KERNEL_STALE_CANDIDATE");
        assert_eq!(err.status_code(), 409);
    }
}
