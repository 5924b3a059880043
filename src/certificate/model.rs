//! In-process evaluation of the certificate invariants.
//!
//! Walks the same finite model a certificate encodes. Only used as a fast
//! precheck; the certificate remains the authority.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::rules::VerdictKind;

use super::{CertRule, CertificateInput};

/// Largest fact universe evaluated in-process (2^20 subsets).
pub const MAX_NATIVE_FACTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    NoContradiction,
    NoIncompatibleObligations,
    OughtImpliesCan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterexample {
    pub invariant: Invariant,
    pub facts: Vec<String>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvariantReport {
    pub fact_universe: usize,
    pub fact_sets_checked: u64,
    pub no_contradiction: bool,
    pub no_incompatible_obligations: bool,
    pub ought_implies_can: bool,
    /// First violation found per invariant.
    pub counterexamples: Vec<Counterexample>,
}

impl InvariantReport {
    pub fn holds(&self) -> bool {
        self.no_contradiction && self.no_incompatible_obligations && self.ought_implies_can
    }

    fn record(&mut self, invariant: Invariant, facts: &BTreeSet<&str>, detail: String) {
        let flag = match invariant {
            Invariant::NoContradiction => &mut self.no_contradiction,
            Invariant::NoIncompatibleObligations => &mut self.no_incompatible_obligations,
            Invariant::OughtImpliesCan => &mut self.ought_implies_can,
        };
        if !*flag {
            return;
        }
        *flag = false;
        self.counterexamples.push(Counterexample {
            invariant,
            facts: facts.iter().map(|f| f.to_string()).collect(),
            detail,
        });
    }
}

struct Model<'a> {
    input: &'a CertificateInput,
}

impl<'a> Model<'a> {
    fn is_valid(&self, facts: &BTreeSet<&str>) -> bool {
        !self
            .input
            .exclusion_groups
            .iter()
            .any(|group| group.iter().all(|f| facts.contains(f.as_str())))
    }

    fn derived(&self, facts: &BTreeSet<&str>) -> Vec<&'a CertRule> {
        self.input
            .rules
            .iter()
            .filter(|r| r.premises.iter().all(|p| facts.contains(p.as_str())))
            .collect()
    }

    fn incompatible(&self, a: &str, b: &str) -> bool {
        self.input
            .incompatibility
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    fn infeasible(&self, action: &str, facts: &BTreeSet<&str>) -> bool {
        self.input.infeasibility.iter().any(|(a, premises)| {
            a == action && premises.iter().all(|p| facts.contains(p.as_str()))
        })
    }

    fn check_set(&self, facts: &BTreeSet<&str>, report: &mut InvariantReport) {
        let derived = self.derived(facts);
        let has = |kind: VerdictKind, action: &str| {
            derived.iter().any(|r| r.kind == kind && r.action == action)
        };

        for action in &self.input.actions {
            let rejected = has(VerdictKind::Rejected, action);
            if rejected && has(VerdictKind::Obligated, action) {
                report.record(
                    Invariant::NoContradiction,
                    facts,
                    format!("{} is both Obligated and Rejected", action),
                );
            } else if rejected && has(VerdictKind::Allowed, action) {
                report.record(
                    Invariant::NoContradiction,
                    facts,
                    format!("{} is both Allowed and Rejected", action),
                );
            }
        }

        let obligated: Vec<&String> = self
            .input
            .actions
            .iter()
            .filter(|a| has(VerdictKind::Obligated, a))
            .collect();

        for (i, a) in obligated.iter().enumerate() {
            for b in &obligated[i..] {
                if self.incompatible(a, b) {
                    report.record(
                        Invariant::NoIncompatibleObligations,
                        facts,
                        format!("{} and {} are both obligated but incompatible", a, b),
                    );
                }
            }
            if self.infeasible(a, facts) {
                let detail = format!("{} is obligated but infeasible", a);
                report.record(Invariant::NoIncompatibleObligations, facts, detail.clone());
                report.record(Invariant::OughtImpliesCan, facts, detail);
            }
        }
    }
}

/// Evaluates the three invariants over every valid subset of the fact
/// universe.
///
/// Returns `None` when the universe has more than [`MAX_NATIVE_FACTS`]
/// facts.
pub fn check_invariants(input: &CertificateInput) -> Option<InvariantReport> {
    let universe: Vec<&str> = input.facts.iter().map(String::as_str).collect();
    if universe.len() > MAX_NATIVE_FACTS {
        warn!(
            facts = universe.len(),
            limit = MAX_NATIVE_FACTS,
            "fact universe too large for in-process invariant check"
        );
        return None;
    }

    let model = Model { input };
    let mut report = InvariantReport {
        fact_universe: universe.len(),
        fact_sets_checked: 0,
        no_contradiction: true,
        no_incompatible_obligations: true,
        ought_implies_can: true,
        counterexamples: Vec::new(),
    };

    for mask in 0u64..(1u64 << universe.len()) {
        let facts: BTreeSet<&str> = universe
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, f)| *f)
            .collect();
        if !model.is_valid(&facts) {
            continue;
        }
        report.fact_sets_checked += 1;
        model.check_set(&facts, &mut report);
    }
    Some(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::rules::Rule;
    use crate::snapshot::SnapshotPayload;
    use crate::store::ArtifactStore;

    fn seeded_input(extra: Option<Rule>) -> CertificateInput {
        let store = ArtifactStore::new();
        if let Some(rule) = extra {
            store.add_rule(rule, "tester").unwrap();
        }
        let bundle = store.build_candidate_runtime_bundle().unwrap();
        let payload = SnapshotPayload::from_bundle(&bundle, "obstetrics", Utc::now());
        CertificateInput::from(&payload.inputs)
    }

    fn rule(premises: &[&str], kind: VerdictKind, action: &str) -> CertRule {
        CertRule {
            id: format!("{}-{}", kind, action),
            premises: premises.iter().map(|p| p.to_string()).collect(),
            kind,
            action: action.to_string(),
        }
    }

    fn tiny(rules: Vec<CertRule>) -> CertificateInput {
        CertificateInput {
            version: "t".into(),
            domain: "test".into(),
            rules,
            actions: vec!["X".into(), "Y".into()],
            facts: vec!["A".into(), "B".into()],
            incompatibility: vec![("X".into(), "Y".into())],
            infeasibility: vec![("X".into(), vec!["B".into()])],
            exclusion_groups: vec![],
        }
    }

    #[test]
    fn test_seed_ruleset_holds() {
        let report = check_invariants(&seeded_input(None)).unwrap();
        assert!(report.holds(), "{:?}", report.counterexamples);
        assert!(report.fact_sets_checked > 0);
    }

    #[test]
    fn test_exclusion_groups_prune_fact_sets() {
        let report = check_invariants(&seeded_input(None)).unwrap();
        // One group of two facts removes a quarter of the power set.
        let total = 1u64 << report.fact_universe;
        assert_eq!(report.fact_sets_checked, total - total / 4);
    }

    #[test]
    fn test_contradiction_detected() {
        let input = tiny(vec![
            rule(&["A"], VerdictKind::Allowed, "Y"),
            rule(&["A", "B"], VerdictKind::Rejected, "Y"),
        ]);
        let report = check_invariants(&input).unwrap();
        assert!(!report.no_contradiction);
        assert!(report.ought_implies_can);
        assert_eq!(report.counterexamples[0].facts, vec!["A", "B"]);
    }

    #[test]
    fn test_incompatible_obligations_detected() {
        let input = tiny(vec![
            rule(&["A"], VerdictKind::Obligated, "X"),
            rule(&["A"], VerdictKind::Obligated, "Y"),
        ]);
        let report = check_invariants(&input).unwrap();
        assert!(!report.no_incompatible_obligations);
        assert!(!report.ought_implies_can);
        assert!(report.no_contradiction);
    }

    #[test]
    fn test_infeasible_obligation_breaks_ought_implies_can() {
        let input = seeded_input(Some(Rule::new(
            "zz_obligate_expectant",
            ["Dx.Preeclampsia"],
            "Obligated(Action.ExpectantManagement)",
            "",
        )));
        let report = check_invariants(&input).unwrap();
        assert!(!report.ought_implies_can);
        assert!(!report.no_incompatible_obligations);
        assert!(report.no_contradiction);
        assert_eq!(report.counterexamples.len(), 2);
    }

    #[test]
    fn test_large_universe_is_skipped() {
        let mut input = tiny(vec![]);
        input.facts = (0..=MAX_NATIVE_FACTS).map(|i| format!("F{}", i)).collect();
        assert!(check_invariants(&input).is_none());
    }
}
