//! Artifact Store Properties
//!
//! Draft/candidate/runtime behavior of a single session store and the
//! session manager:
//! - Candidate construction is idempotent
//! - Promotion clears proposals and keeps constraints
//! - Failed mutations leave the revision untouched
//! - Conflict screening over the merged candidate
//! - Expired sessions come back freshly seeded

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rulekernel::conflict::{detect_conflicts, unresolvable};
use rulekernel::rules::Rule;
use rulekernel::store::{
    seed_rules, ArtifactStore, Promotion, SessionManager, StoreError, VerificationState,
};

fn rule(id: &str, premises: &[&str], outcome: &str) -> Rule {
    Rule::new(id, premises.iter().copied(), outcome, "")
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// R1 {Dx.A, Ctx.GA_>=34w} → Obligated(X), R2 {Dx.A} → Allowed(Y), with X/Y incompatible.
fn example_store() -> ArtifactStore {
    let store = ArtifactStore::new();
    store
        .replace_draft_proposals(
            "example-1",
            "author",
            "example ruleset",
            vec![
                rule("R1", &["Dx.A", "Ctx.GA_>=34w"], "Obligated(Action.X)"),
                rule("R2", &["Dx.A"], "Allowed(Action.Y)"),
            ],
        )
        .unwrap();
    store
        .add_incompatibility_pair("Action.X", "Action.Y", "author")
        .unwrap();
    store
}

// =============================================================================
// Candidate Construction
// =============================================================================

/// Building the candidate twice without a mutation yields the same bundle.
#[test]
fn test_candidate_is_idempotent() {
    let store = ArtifactStore::new();
    store
        .add_rule(rule("extra", &["Dx.Asthma"], "Allowed(Action.ExpectantManagement)"), "alice")
        .unwrap();

    let first = store.build_candidate_runtime_bundle().unwrap();
    let second = store.build_candidate_runtime_bundle().unwrap();
    assert_eq!(first, second);
    assert_eq!(store.get_draft().unwrap().manifest.revision, 2);
}

/// Candidate rules are ordered by rule id and the draft wins on collisions.
#[test]
fn test_candidate_merges_by_rule_id() {
    let store = ArtifactStore::new();
    store.promote_candidate_to_runtime(Promotion::new("v")).unwrap();

    let id = seed_rules()[1].rule_id().to_string();
    store
        .add_rule(rule(&id, &["Dx.PlacentalAbruption"], "Allowed(Action.ExpeditedDelivery)"), "bob")
        .unwrap();

    let candidate = store.build_candidate_runtime_bundle().unwrap();
    assert_eq!(candidate.ruleset.len(), seed_rules().len());
    let ids: Vec<&str> = candidate.ruleset.iter().map(|r| r.rule_id()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
    let replaced = candidate.ruleset.iter().find(|r| r.rule_id() == id).unwrap();
    assert_eq!(replaced.outcome(), "Allowed(Action.ExpeditedDelivery)");
}

// =============================================================================
// Promotion
// =============================================================================

/// Promotion clears proposals, keeps constraints, and the next candidate
/// equals the promoted bundle.
#[test]
fn test_promotion_clears_proposals_and_keeps_constraints() {
    let store = ArtifactStore::new();
    let constraints_before = store.get_draft().unwrap().constraints;

    let promoted = store
        .promote_candidate_to_runtime(Promotion::new("verifier"))
        .unwrap();

    let draft = store.get_draft().unwrap();
    assert!(draft.proposals.is_empty());
    assert!(draft.rule_provenance.is_empty());
    assert_eq!(draft.constraints, constraints_before);

    let status = store.get_verification_status().unwrap();
    assert_eq!(status.status, VerificationState::Verified);
    assert_eq!(status.verified_by.as_deref(), Some("verifier"));

    let next = store.build_candidate_runtime_bundle().unwrap();
    assert!(next.same_content(&promoted));
    assert_eq!(store.get_runtime_ruleset().unwrap(), promoted.ruleset);
}

/// A candidate that changed after it was captured is not promoted.
#[test]
fn test_guarded_promotion_refuses_stale_candidate() {
    let store = ArtifactStore::new();
    let captured = store.build_candidate_runtime_bundle().unwrap();
    store
        .remove_rule(seed_rules()[0].rule_id(), "editor")
        .unwrap();

    let err = store
        .promote_verified_candidate(&captured, Promotion::new("verifier"))
        .unwrap_err();
    assert_eq!(
        err,
        StoreError::StaleCandidate {
            verified_revision: 1,
            current_revision: 2,
        }
    );
    assert!(store.get_runtime_bundle().unwrap().is_none());
    assert_eq!(store.get_draft().unwrap().proposals.len(), seed_rules().len() - 1);
}

// =============================================================================
// Failed Mutations
// =============================================================================

/// A duplicate rule id is a conflict and does not bump the revision.
#[test]
fn test_duplicate_rule_keeps_revision() {
    let store = example_store();
    let revision = store.get_draft().unwrap().manifest.revision;

    let err = store
        .add_rule(rule("R2", &["Dx.B"], "Allowed(Action.Z)"), "author")
        .unwrap_err();
    assert_eq!(err.status_code(), 409);
    assert_eq!(store.get_draft().unwrap().manifest.revision, revision);
}

/// Out-of-range constraint indices are reported, not clamped.
#[test]
fn test_constraint_index_out_of_range() {
    let store = example_store();
    let err = store.remove_incompatibility_pair(7, "author").unwrap_err();
    assert!(matches!(err, StoreError::IndexOutOfRange { index: 7, len: 3, .. }));

    let err = store
        .update_infeasibility_entry(9, "Action.X", set(&["Dx.A"]), "author")
        .unwrap_err();
    assert_eq!(err.code(), "KERNEL_INDEX_OUT_OF_RANGE");
}

// =============================================================================
// Conflict Screening
// =============================================================================

/// R1/R2 target different actions; adding R3 {Dx.A} → Rejected(X) conflicts
/// with R1 and is resolvable by specificity.
#[test]
fn test_example_conflict_is_resolvable() {
    let store = example_store();
    let candidate = store.build_candidate_runtime_bundle().unwrap();
    assert_eq!(candidate.ruleset.len(), 2);
    assert!(detect_conflicts(&candidate.ruleset).is_empty());

    store
        .add_rule(rule("R3", &["Dx.A"], "Rejected(Action.X)"), "author")
        .unwrap();
    let warnings = detect_conflicts(&store.build_candidate_runtime_bundle().unwrap().ruleset);
    assert_eq!(warnings.len(), 1);
    let warning = &warnings[0];
    assert_eq!((warning.rule_a_id.as_str(), warning.rule_b_id.as_str()), ("R1", "R3"));
    assert_eq!(warning.action, "Action.X");
    assert!(warning.resolvable);
    assert!(unresolvable(&warnings).is_empty());
}

/// Disjoint premises cannot be ordered by specificity.
#[test]
fn test_disjoint_premises_are_unresolvable() {
    let store = example_store();
    store
        .add_rule(rule("R4", &["Dx.C"], "Rejected(Action.X)"), "author")
        .unwrap();
    let warnings = detect_conflicts(&store.build_candidate_runtime_bundle().unwrap().ruleset);
    assert_eq!(warnings.len(), 1);
    assert!(!warnings[0].resolvable);
    assert_eq!(unresolvable(&warnings).len(), 1);
}

// =============================================================================
// Sessions
// =============================================================================

/// Sessions are isolated from each other.
#[test]
fn test_sessions_are_isolated() {
    let sessions = SessionManager::default();
    let a = sessions.get_or_create("a").unwrap();
    a.remove_rule(seed_rules()[0].rule_id(), "u").unwrap();

    let b = sessions.get_or_create("b").unwrap();
    assert_eq!(b.get_draft().unwrap().proposals.len(), seed_rules().len());
    assert_eq!(sessions.session_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
}

/// A session idle past its TTL is evicted and recreated from the seed.
#[test]
fn test_expired_session_is_reseeded() {
    let sessions = SessionManager::new(Duration::from_millis(50));
    {
        let store = sessions.get_or_create("s").unwrap();
        store.remove_rule(seed_rules()[0].rule_id(), "u").unwrap();
        assert_eq!(store.get_draft().unwrap().manifest.revision, 2);
    }

    thread::sleep(Duration::from_millis(120));
    assert!(sessions.session_ids().unwrap().is_empty());

    let fresh = sessions.get_or_create("s").unwrap();
    let draft = fresh.get_draft().unwrap();
    assert_eq!(draft.manifest.revision, 1);
    assert_eq!(draft.proposals.len(), seed_rules().len());
}

/// A store still held by a caller is never evicted.
#[test]
fn test_in_use_session_survives_eviction() {
    let sessions = SessionManager::new(Duration::from_millis(20));
    let held = sessions.get_or_create("busy").unwrap();
    thread::sleep(Duration::from_millis(60));

    assert!(sessions.evict_expired().unwrap().is_empty());
    let again = sessions.get_or_create("busy").unwrap();
    assert!(Arc::ptr_eq(&held, &again));
}
