//! Data model for drafts, runtime bundles and verification status.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rules::Rule;

/// Who created an entry, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Provenance {
    pub fn new(created_by: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            created_by: created_by.into(),
            created_at,
        }
    }
}

/// Provenance rows are keyed by `rule_id`.
pub type RuleProvenance = Provenance;

/// Revision-stamped manifest of a draft or bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub artifact_source: String,
    pub ruleset_version: String,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    pub change_summary: String,
}

/// Unordered pair of actions that cannot both be undertaken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompatibilityPair {
    pub a: String,
    pub b: String,
    #[serde(flatten)]
    pub provenance: Provenance,
}

impl IncompatibilityPair {
    /// Order-insensitive comparison of the two actions.
    pub fn same_pair(&self, a: &str, b: &str) -> bool {
        (self.a == a && self.b == b) || (self.a == b && self.b == a)
    }
}

/// `action` is infeasible whenever every fact in `premises` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfeasibilityEntry {
    pub action: String,
    pub premises: BTreeSet<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// Facts that may never all hold at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactExclusionGroup {
    pub facts: BTreeSet<String>,
    #[serde(flatten)]
    pub provenance: Provenance,
}

/// The three constraint collections carried by drafts and bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub incompatibility: Vec<IncompatibilityPair>,
    pub infeasibility: Vec<InfeasibilityEntry>,
    pub fact_exclusions: Vec<FactExclusionGroup>,
}

impl ConstraintSet {
    /// Replace-if-nonempty merge of a draft's constraints over a runtime's.
    ///
    /// Each collection is taken wholesale from `self` when non-empty and
    /// from `runtime` otherwise. There is no per-item merge: emptying a
    /// draft collection does not clear the runtime one.
    pub fn overlay(&self, runtime: Option<&ConstraintSet>) -> ConstraintSet {
        fn pick<T: Clone>(draft: &[T], runtime: Option<&[T]>) -> Vec<T> {
            if !draft.is_empty() {
                return draft.to_vec();
            }
            runtime.map(<[T]>::to_vec).unwrap_or_default()
        }
        ConstraintSet {
            incompatibility: pick(
                &self.incompatibility,
                runtime.map(|r| r.incompatibility.as_slice()),
            ),
            infeasibility: pick(
                &self.infeasibility,
                runtime.map(|r| r.infeasibility.as_slice()),
            ),
            fact_exclusions: pick(
                &self.fact_exclusions,
                runtime.map(|r| r.fact_exclusions.as_slice()),
            ),
        }
    }
}

/// Mutable staging area of pending proposals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftProposals {
    pub manifest: ArtifactManifest,
    pub proposals: Vec<Rule>,
    pub rule_provenance: BTreeMap<String, RuleProvenance>,
    #[serde(flatten)]
    pub constraints: ConstraintSet,
}

impl DraftProposals {
    pub fn find_rule(&self, rule_id: &str) -> Option<&Rule> {
        self.proposals.iter().find(|r| r.rule_id() == rule_id)
    }
}

/// A candidate or promoted bundle.
///
/// Promoted bundles are only produced by successful promotion and are
/// replaced wholesale by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub manifest: ArtifactManifest,
    pub ruleset: Vec<Rule>,
    pub rule_provenance: BTreeMap<String, RuleProvenance>,
    #[serde(flatten)]
    pub constraints: ConstraintSet,
    pub proof_report: Value,
}

impl ArtifactBundle {
    /// Equality ignoring `proof_report`.
    pub fn same_content(&self, other: &ArtifactBundle) -> bool {
        self.manifest == other.manifest
            && self.ruleset == other.ruleset
            && self.rule_provenance == other.rule_provenance
            && self.constraints == other.constraints
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationState {
    Unverified,
    Verified,
    Error,
}

impl VerificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationState::Unverified => "unverified",
            VerificationState::Verified => "verified",
            VerificationState::Error => "error",
        }
    }
}

/// Verification status of a session's runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub status: VerificationState,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub verified_snapshot_dir: Option<PathBuf>,
}

impl VerificationStatus {
    pub fn unverified() -> Self {
        Self {
            status: VerificationState::Unverified,
            verified_at: None,
            verified_by: None,
            verified_snapshot_dir: None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == VerificationState::Verified
    }
}

/// Metadata recorded by a successful promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub verified_by: String,
    pub verified_snapshot_dir: Option<PathBuf>,
    pub verified_at: Option<DateTime<Utc>>,
    pub proof_report: Value,
}

impl Promotion {
    pub fn new(verified_by: impl Into<String>) -> Self {
        Self {
            verified_by: verified_by.into(),
            verified_snapshot_dir: None,
            verified_at: None,
            proof_report: Value::Null,
        }
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.verified_snapshot_dir = Some(dir.into());
        self
    }

    pub fn with_verified_at(mut self, at: DateTime<Utc>) -> Self {
        self.verified_at = Some(at);
        self
    }

    pub fn with_proof_report(mut self, report: Value) -> Self {
        self.proof_report = report;
        self
    }
}
