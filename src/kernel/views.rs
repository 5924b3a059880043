//! Authoring views over a session.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conflict::ConflictWarning;
use crate::rules::Rule;
use crate::store::{
    ArtifactBundle, ArtifactManifest, ConstraintSet, DraftProposals, RuleProvenance,
    VerificationStatus,
};

/// A rule with its provenance resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleView {
    pub rule_id: String,
    pub premises: Vec<String>,
    pub outcome: String,
    pub note: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCounts {
    pub rules: usize,
    pub incompatibility: usize,
    pub infeasibility: usize,
    pub fact_exclusions: usize,
}

impl ViewCounts {
    fn of(rules: usize, constraints: &ConstraintSet) -> Self {
        Self {
            rules,
            incompatibility: constraints.incompatibility.len(),
            infeasibility: constraints.infeasibility.len(),
            fact_exclusions: constraints.fact_exclusions.len(),
        }
    }
}

/// Rules without a provenance row are attributed to the last manifest update.
fn rule_views(
    rules: &[Rule],
    provenance: &BTreeMap<String, RuleProvenance>,
    manifest: &ArtifactManifest,
) -> Vec<RuleView> {
    rules
        .iter()
        .map(|rule| {
            let (created_by, created_at) = match provenance.get(rule.rule_id()) {
                Some(p) => (p.created_by.clone(), p.created_at),
                None => (manifest.updated_by.clone(), manifest.updated_at),
            };
            RuleView {
                rule_id: rule.rule_id().to_string(),
                premises: rule.premises().iter().cloned().collect(),
                outcome: rule.outcome().to_string(),
                note: rule.note().to_string(),
                created_by,
                created_at,
            }
        })
        .collect()
}

/// The draft as an author sees it, with conflicts of the merged candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveView {
    pub manifest: ArtifactManifest,
    pub rules: Vec<RuleView>,
    #[serde(flatten)]
    pub constraints: ConstraintSet,
    pub counts: ViewCounts,
    pub conflicts: Vec<ConflictWarning>,
}

impl ActiveView {
    pub fn new(draft: DraftProposals, conflicts: Vec<ConflictWarning>) -> Self {
        let rules = rule_views(&draft.proposals, &draft.rule_provenance, &draft.manifest);
        Self {
            counts: ViewCounts::of(rules.len(), &draft.constraints),
            manifest: draft.manifest,
            rules,
            constraints: draft.constraints,
            conflicts,
        }
    }
}

/// The verified runtime, or empty collections if the session never verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeView {
    pub verification: VerificationStatus,
    pub manifest: Option<ArtifactManifest>,
    pub rules: Vec<RuleView>,
    #[serde(flatten)]
    pub constraints: ConstraintSet,
    pub counts: ViewCounts,
    pub proof_report: Value,
}

impl RuntimeView {
    pub fn new(verification: VerificationStatus, runtime: Option<ArtifactBundle>) -> Self {
        match runtime {
            Some(bundle) => {
                let rules = rule_views(&bundle.ruleset, &bundle.rule_provenance, &bundle.manifest);
                Self {
                    verification,
                    counts: ViewCounts::of(rules.len(), &bundle.constraints),
                    manifest: Some(bundle.manifest),
                    rules,
                    constraints: bundle.constraints,
                    proof_report: bundle.proof_report,
                }
            }
            None => {
                let constraints = ConstraintSet::default();
                Self {
                    verification,
                    manifest: None,
                    rules: Vec::new(),
                    counts: ViewCounts::of(0, &constraints),
                    constraints,
                    proof_report: Value::Null,
                }
            }
        }
    }
}
