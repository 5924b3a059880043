//! Certificate compiler
//!
//! Compiles a published ruleset into Lean 4 source whose successful
//! compilation proves three invariants over every valid subset of the
//! fact universe:
//!
//! - no contradictory verdicts (`Obligated`/`Rejected` or `Allowed`/`Rejected`
//!   on the same action)
//! - no incompatible obligations (no two obligated actions form a declared
//!   incompatible pair, and no obligated action is infeasible)
//! - ought implies can (every obligated action is feasible)
//!
//! A subset is valid when it does not contain every fact of some exclusion
//! group. The same checks are available in-process through
//! [`check_invariants`] for small universes.

mod lean;
mod model;

pub use lean::{generate_certificate, CERTIFICATE_FILE};
pub use model::{check_invariants, Counterexample, Invariant, InvariantReport, MAX_NATIVE_FACTS};

use serde::{Deserialize, Serialize};

use crate::rules::VerdictKind;
use crate::snapshot::VerifierInputs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRule {
    pub id: String,
    pub premises: Vec<String>,
    pub kind: VerdictKind,
    pub action: String,
}

/// Literal data embedded in a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateInput {
    pub version: String,
    pub domain: String,
    pub rules: Vec<CertRule>,
    pub actions: Vec<String>,
    pub facts: Vec<String>,
    pub incompatibility: Vec<(String, String)>,
    pub infeasibility: Vec<(String, Vec<String>)>,
    pub exclusion_groups: Vec<Vec<String>>,
}

impl From<&VerifierInputs> for CertificateInput {
    fn from(inputs: &VerifierInputs) -> Self {
        let version = if inputs.ruleset.version.is_empty() {
            "unknown".to_string()
        } else {
            inputs.ruleset.version.clone()
        };
        let domain = if inputs.ruleset.domain.is_empty() {
            "unknown".to_string()
        } else {
            inputs.ruleset.domain.clone()
        };
        Self {
            version,
            domain,
            rules: inputs
                .ruleset
                .rules
                .iter()
                .map(|r| CertRule {
                    id: r.id.clone(),
                    premises: r.premises.clone(),
                    kind: r.out.kind,
                    action: r.out.action.clone(),
                })
                .collect(),
            actions: inputs.ruleset.actions.clone(),
            facts: inputs.ruleset.facts.clone(),
            incompatibility: inputs
                .incompatibility
                .pairs
                .iter()
                .map(|p| (p.a.clone(), p.b.clone()))
                .collect(),
            infeasibility: inputs
                .infeasibility
                .entries
                .iter()
                .map(|e| (e.action.clone(), e.premises.clone()))
                .collect(),
            exclusion_groups: inputs
                .fact_exclusions
                .groups
                .iter()
                .map(|g| g.facts.clone())
                .collect(),
        }
    }
}
