//! Demo ruleset every new session starts from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::rules::Rule;

use super::types::{
    ArtifactManifest, ConstraintSet, DraftProposals, FactExclusionGroup, IncompatibilityPair,
    InfeasibilityEntry, Provenance,
};

pub const SEED_ACTOR: &str = "system";
pub const SEED_ARTIFACT_SOURCE: &str = "in_memory";
pub const SEED_RULESET_VERSION: &str = "local-session";
pub const SEED_CHANGE_SUMMARY: &str = "Seed demo ruleset (pending draft baseline).";

pub fn seed_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            "hg_obligate_immediate_delivery_severe_pe_34",
            ["Dx.Preeclampsia", "DxAttr.Preeclampsia.Severe", "Ctx.GA_>=34w"],
            "Obligated(Action.ImmediateDelivery)",
            "Severe preeclampsia at >=34w obligates immediate delivery.",
        ),
        Rule::new(
            "hg_obligate_expedited_delivery_placental_abruption",
            ["Dx.PlacentalAbruption"],
            "Obligated(Action.ExpeditedDelivery)",
            "Placental abruption obligates expedited delivery.",
        ),
        Rule::new(
            "hg_allow_expedited_delivery_hypertensive_28",
            ["Dx.HypertensiveDisorder", "Ctx.GA_>=28w"],
            "Allowed(Action.ExpeditedDelivery)",
            "Hypertensive disorder at >=28w permits expedited delivery.",
        ),
        Rule::new(
            "hg_allow_expectant_nonsevere_early_window",
            ["Dx.Preeclampsia", "Ctx.GA_>=28w", "Ctx.MaternalAge_<35y"],
            "Allowed(Action.ExpectantManagement)",
            "Non-severe early window may allow expectant management.",
        ),
    ]
}

/// Seed constraints. Every action is feasible unless an entry says otherwise.
pub fn seed_constraints(now: DateTime<Utc>) -> ConstraintSet {
    let prov = || Provenance::new(SEED_ACTOR, now);
    let pair = |a: &str, b: &str| IncompatibilityPair {
        a: a.to_string(),
        b: b.to_string(),
        provenance: prov(),
    };
    let infeasible = |action: &str, premises: &[&str]| InfeasibilityEntry {
        action: action.to_string(),
        premises: premises.iter().map(|p| p.to_string()).collect(),
        provenance: prov(),
    };

    ConstraintSet {
        incompatibility: vec![
            pair("Action.ImmediateDelivery", "Action.ExpectantManagement"),
            pair("Action.ExpeditedDelivery", "Action.ExpectantManagement"),
        ],
        infeasibility: vec![
            infeasible("Action.ExpectantManagement", &["Dx.FetalDemise"]),
            infeasible("Action.ExpectantManagement", &["DxAttr.Preeclampsia.Severe"]),
            infeasible("Action.ImmediateDelivery", &["Ctx.GA_<34w"]),
        ],
        fact_exclusions: vec![FactExclusionGroup {
            facts: ["Ctx.GA_<34w", "Ctx.GA_>=34w"]
                .iter()
                .map(|f| f.to_string())
                .collect(),
            provenance: prov(),
        }],
    }
}

/// Draft at revision 1 holding the demo rules and constraints.
pub fn seed_draft(now: DateTime<Utc>) -> DraftProposals {
    let proposals = seed_rules();
    let rule_provenance: BTreeMap<_, _> = proposals
        .iter()
        .map(|r| (r.rule_id().to_string(), Provenance::new(SEED_ACTOR, now)))
        .collect();

    DraftProposals {
        manifest: ArtifactManifest {
            artifact_source: SEED_ARTIFACT_SOURCE.to_string(),
            ruleset_version: SEED_RULESET_VERSION.to_string(),
            revision: 1,
            updated_at: now,
            updated_by: SEED_ACTOR.to_string(),
            change_summary: SEED_CHANGE_SUMMARY.to_string(),
        },
        proposals,
        rule_provenance,
        constraints: seed_constraints(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::detect_conflicts;
    use crate::registry::TokenRegistry;

    #[test]
    fn test_seed_tokens_are_registered() {
        let registry = TokenRegistry::builtin();
        for rule in seed_rules() {
            registry.validate_rule(&rule).unwrap();
        }
        let constraints = seed_constraints(Utc::now());
        for pair in &constraints.incompatibility {
            registry.validate_incompatibility(&pair.a, &pair.b).unwrap();
        }
        for entry in &constraints.infeasibility {
            registry
                .validate_infeasibility(&entry.action, &entry.premises)
                .unwrap();
        }
    }

    #[test]
    fn test_seed_is_conflict_free() {
        assert!(detect_conflicts(&seed_rules()).is_empty());
    }

    #[test]
    fn test_seed_draft_starts_at_revision_one() {
        let draft = seed_draft(Utc::now());
        assert_eq!(draft.manifest.revision, 1);
        assert_eq!(draft.rule_provenance.len(), draft.proposals.len());
    }
}
