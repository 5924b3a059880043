//! Versioned artifact store
//!
//! Each session owns a draft (pending proposals), an optional runtime
//! bundle (the last verified and promoted snapshot) and a verification
//! status. The draft is edited freely; the runtime is only ever replaced
//! by promotion of a verified candidate.
//!
//! # Candidate merge
//!
//! Rules merge by `rule_id` with the draft winning. Constraint collections
//! do not merge per item: each draft collection replaces the runtime one
//! only when it is non-empty.

mod artifact_store;
mod errors;
mod seed;
mod session;
mod types;

pub use artifact_store::ArtifactStore;
pub use errors::{StoreError, StoreResult};
pub use seed::{seed_constraints, seed_draft, seed_rules, SEED_ACTOR};
pub use session::{SessionManager, DEFAULT_SESSION_TTL};
pub use types::{
    ArtifactBundle, ArtifactManifest, ConstraintSet, DraftProposals, FactExclusionGroup,
    IncompatibilityPair, InfeasibilityEntry, Promotion, Provenance, RuleProvenance,
    VerificationState, VerificationStatus,
};
