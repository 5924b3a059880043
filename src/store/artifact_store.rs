//! Per-session artifact store.
//!
//! Holds one draft, one optional runtime bundle and one verification
//! status behind a single exclusive lock. Every mutation bumps the draft
//! revision and returns the new draft snapshot; every failed operation
//! leaves the store untouched.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::observability::Event;
use crate::registry::ValidationError;
use crate::rules::Rule;

use super::errors::{StoreError, StoreResult};
use super::seed::seed_draft;
use super::types::{
    ArtifactBundle, DraftProposals, FactExclusionGroup, IncompatibilityPair, InfeasibilityEntry,
    Promotion, Provenance, VerificationState, VerificationStatus,
};

struct StoreState {
    draft: DraftProposals,
    runtime: Option<ArtifactBundle>,
    verification: VerificationStatus,
}

impl StoreState {
    /// Applies `apply` to the draft and stamps a new revision.
    ///
    /// Callers run every check before calling this.
    fn mutate<F>(&mut self, updated_by: &str, change_summary: String, apply: F) -> DraftProposals
    where
        F: FnOnce(&mut DraftProposals),
    {
        apply(&mut self.draft);
        let manifest = &mut self.draft.manifest;
        manifest.revision += 1;
        manifest.updated_at = Utc::now();
        manifest.updated_by = updated_by.to_string();
        manifest.change_summary = change_summary;

        info!(
            event = %Event::DraftMutated,
            revision = manifest.revision,
            updated_by,
            change_summary = %manifest.change_summary,
            "draft updated"
        );
        self.draft.clone()
    }

    fn candidate(&self) -> ArtifactBundle {
        let runtime = self.runtime.as_ref();

        let mut merged: BTreeMap<String, Rule> = runtime
            .map(|bundle| {
                bundle
                    .ruleset
                    .iter()
                    .map(|r| (r.rule_id().to_string(), r.clone()))
                    .collect()
            })
            .unwrap_or_default();
        for rule in &self.draft.proposals {
            merged.insert(rule.rule_id().to_string(), rule.clone());
        }

        let mut rule_provenance = runtime
            .map(|bundle| bundle.rule_provenance.clone())
            .unwrap_or_default();
        rule_provenance.extend(
            self.draft
                .rule_provenance
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        ArtifactBundle {
            manifest: self.draft.manifest.clone(),
            ruleset: merged.into_values().collect(),
            rule_provenance,
            constraints: self
                .draft
                .constraints
                .overlay(runtime.map(|bundle| &bundle.constraints)),
            proof_report: json!({
                "status": "preview",
                "notes": "Candidate bundle built from runtime + draft proposals.",
            }),
        }
    }

    fn promote(&mut self, candidate: ArtifactBundle, promotion: Promotion) -> ArtifactBundle {
        let verified_at = promotion.verified_at.unwrap_or_else(Utc::now);
        let mut bundle = candidate;
        bundle.proof_report = promotion.proof_report;

        self.runtime = Some(bundle.clone());
        self.verification = VerificationStatus {
            status: VerificationState::Verified,
            verified_at: Some(verified_at),
            verified_by: Some(promotion.verified_by.clone()),
            verified_snapshot_dir: promotion.verified_snapshot_dir.clone(),
        };
        // Proposals are now part of the runtime; constraints stay in the draft.
        self.draft.proposals.clear();
        self.draft.rule_provenance.clear();

        info!(
            event = %Event::RuntimePromoted,
            revision = bundle.manifest.revision,
            rules = bundle.ruleset.len(),
            verified_by = %promotion.verified_by,
            snapshot = ?promotion.verified_snapshot_dir,
            "candidate promoted to runtime; draft proposals reset"
        );
        bundle
    }
}

fn check_index(collection: &'static str, index: usize, len: usize) -> StoreResult<()> {
    if index < len {
        Ok(())
    } else {
        Err(StoreError::IndexOutOfRange {
            collection,
            index,
            len,
        })
    }
}

fn join_tokens(tokens: &BTreeSet<String>) -> String {
    tokens.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Isolated draft/runtime state for one session.
pub struct ArtifactStore {
    state: Mutex<StoreState>,
    last_accessed: Mutex<Instant>,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore {
    /// Creates a store seeded with the demo ruleset.
    pub fn new() -> Self {
        Self::with_draft(seed_draft(Utc::now()))
    }

    /// Creates an unverified store starting from the given draft.
    pub fn with_draft(draft: DraftProposals) -> Self {
        Self {
            state: Mutex::new(StoreState {
                draft,
                runtime: None,
                verification: VerificationStatus::unverified(),
            }),
            last_accessed: Mutex::new(Instant::now()),
        }
    }

    pub fn last_accessed(&self) -> Instant {
        match self.last_accessed.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn touch(&self) {
        match self.last_accessed.lock() {
            Ok(mut guard) => *guard = Instant::now(),
            Err(poisoned) => *poisoned.into_inner() = Instant::now(),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreState>> {
        self.touch();
        self.state.lock().map_err(|_| StoreError::lock_poisoned())
    }

    // ==================== Reads ====================

    pub fn get_draft(&self) -> StoreResult<DraftProposals> {
        Ok(self.lock()?.draft.clone())
    }

    pub fn get_runtime_bundle(&self) -> StoreResult<Option<ArtifactBundle>> {
        Ok(self.lock()?.runtime.clone())
    }

    /// Runtime rules, empty if the session was never verified.
    pub fn get_runtime_ruleset(&self) -> StoreResult<Vec<Rule>> {
        Ok(self
            .lock()?
            .runtime
            .as_ref()
            .map(|bundle| bundle.ruleset.clone())
            .unwrap_or_default())
    }

    pub fn get_verification_status(&self) -> StoreResult<VerificationStatus> {
        Ok(self.lock()?.verification.clone())
    }

    /// Runtime bundle and status read under one lock acquisition.
    pub fn runtime_snapshot(&self) -> StoreResult<(VerificationStatus, Option<ArtifactBundle>)> {
        let state = self.lock()?;
        Ok((state.verification.clone(), state.runtime.clone()))
    }

    /// Merge of runtime and draft. Never mutates state.
    ///
    /// Draft rules replace runtime rules with the same `rule_id`; the
    /// merged list is ordered by `rule_id`. Constraint collections use
    /// replace-if-nonempty (see [`ConstraintSet::overlay`]).
    ///
    /// [`ConstraintSet::overlay`]: super::types::ConstraintSet::overlay
    pub fn build_candidate_runtime_bundle(&self) -> StoreResult<ArtifactBundle> {
        Ok(self.lock()?.candidate())
    }

    // ==================== Rules ====================

    /// Replaces the whole proposal list, keeping provenance for known ids.
    pub fn replace_draft_proposals(
        &self,
        ruleset_version: &str,
        updated_by: &str,
        change_summary: &str,
        rules: Vec<Rule>,
    ) -> StoreResult<DraftProposals> {
        let mut seen = HashSet::new();
        let duplicates: BTreeSet<String> = rules
            .iter()
            .filter(|r| !seen.insert(r.rule_id()))
            .map(|r| r.rule_id().to_string())
            .collect();
        if !duplicates.is_empty() {
            return Err(ValidationError::DuplicateRuleIds {
                ids: duplicates.into_iter().collect(),
            }
            .into());
        }

        let mut state = self.lock()?;
        let now = Utc::now();
        let previous = &state.draft.rule_provenance;
        let rule_provenance: BTreeMap<String, Provenance> = rules
            .iter()
            .map(|r| {
                let prov = previous
                    .get(r.rule_id())
                    .cloned()
                    .unwrap_or_else(|| Provenance::new(updated_by, now));
                (r.rule_id().to_string(), prov)
            })
            .collect();

        let version = ruleset_version.to_string();
        Ok(state.mutate(updated_by, change_summary.to_string(), move |draft| {
            draft.manifest.ruleset_version = version;
            draft.proposals = rules;
            draft.rule_provenance = rule_provenance;
        }))
    }

    pub fn add_rule(&self, rule: Rule, created_by: &str) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        if state.draft.find_rule(rule.rule_id()).is_some() {
            return Err(StoreError::DuplicateRule {
                rule_id: rule.rule_id().to_string(),
            });
        }
        let id = rule.rule_id().to_string();
        let prov = Provenance::new(created_by, Utc::now());
        Ok(state.mutate(created_by, format!("Added rule: {}", id), move |draft| {
            draft.rule_provenance.insert(id, prov);
            draft.proposals.push(rule);
        }))
    }

    /// Replaces rule `rule_id`. The replacement may carry a new id, in which
    /// case the original provenance row moves to the new id.
    pub fn update_rule(
        &self,
        rule_id: &str,
        rule: Rule,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        let position = state
            .draft
            .proposals
            .iter()
            .position(|r| r.rule_id() == rule_id)
            .ok_or_else(|| StoreError::RuleNotFound {
                rule_id: rule_id.to_string(),
            })?;
        if rule.rule_id() != rule_id && state.draft.find_rule(rule.rule_id()).is_some() {
            return Err(StoreError::DuplicateRule {
                rule_id: rule.rule_id().to_string(),
            });
        }

        let old_id = rule_id.to_string();
        let now = Utc::now();
        let actor = updated_by.to_string();
        Ok(state.mutate(updated_by, format!("Updated rule: {}", rule_id), move |draft| {
            let prov = draft
                .rule_provenance
                .remove(&old_id)
                .unwrap_or_else(|| Provenance::new(actor, now));
            draft
                .rule_provenance
                .insert(rule.rule_id().to_string(), prov);
            draft.proposals[position] = rule;
        }))
    }

    pub fn remove_rule(&self, rule_id: &str, updated_by: &str) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        if state.draft.find_rule(rule_id).is_none() {
            return Err(StoreError::RuleNotFound {
                rule_id: rule_id.to_string(),
            });
        }
        Ok(state.mutate(updated_by, format!("Removed rule: {}", rule_id), |draft| {
            draft.proposals.retain(|r| r.rule_id() != rule_id);
            draft.rule_provenance.remove(rule_id);
        }))
    }

    // ==================== Incompatibility ====================

    pub fn add_incompatibility_pair(
        &self,
        a: &str,
        b: &str,
        created_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        if state
            .draft
            .constraints
            .incompatibility
            .iter()
            .any(|p| p.same_pair(a, b))
        {
            return Err(StoreError::DuplicateIncompatibility {
                a: a.to_string(),
                b: b.to_string(),
            });
        }
        let pair = IncompatibilityPair {
            a: a.to_string(),
            b: b.to_string(),
            provenance: Provenance::new(created_by, Utc::now()),
        };
        Ok(state.mutate(
            created_by,
            format!("Added incompatibility pair: ({}, {})", a, b),
            move |draft| draft.constraints.incompatibility.push(pair),
        ))
    }

    /// Rewrites the pair at `index`, keeping its original provenance.
    pub fn update_incompatibility_pair(
        &self,
        index: usize,
        a: &str,
        b: &str,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        check_index(
            "Incompatibility pair",
            index,
            state.draft.constraints.incompatibility.len(),
        )?;
        Ok(state.mutate(
            updated_by,
            format!("Updated incompatibility pair at index {}: ({}, {})", index, a, b),
            |draft| {
                let pair = &mut draft.constraints.incompatibility[index];
                pair.a = a.to_string();
                pair.b = b.to_string();
            },
        ))
    }

    pub fn remove_incompatibility_pair(
        &self,
        index: usize,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        let pairs = &state.draft.constraints.incompatibility;
        check_index("Incompatibility pair", index, pairs.len())?;
        let summary = format!(
            "Removed incompatibility pair: ({}, {})",
            pairs[index].a, pairs[index].b
        );
        Ok(state.mutate(updated_by, summary, |draft| {
            draft.constraints.incompatibility.remove(index);
        }))
    }

    // ==================== Infeasibility ====================

    pub fn add_infeasibility_entry(
        &self,
        action: &str,
        premises: BTreeSet<String>,
        created_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        let summary = format!(
            "Added infeasibility entry: {} with premises [{}]",
            action,
            join_tokens(&premises)
        );
        let entry = InfeasibilityEntry {
            action: action.to_string(),
            premises,
            provenance: Provenance::new(created_by, Utc::now()),
        };
        Ok(state.mutate(created_by, summary, move |draft| {
            draft.constraints.infeasibility.push(entry)
        }))
    }

    pub fn update_infeasibility_entry(
        &self,
        index: usize,
        action: &str,
        premises: BTreeSet<String>,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        check_index(
            "Infeasibility entry",
            index,
            state.draft.constraints.infeasibility.len(),
        )?;
        Ok(state.mutate(
            updated_by,
            format!("Updated infeasibility entry at index {}: {}", index, action),
            move |draft| {
                let entry = &mut draft.constraints.infeasibility[index];
                entry.action = action.to_string();
                entry.premises = premises;
            },
        ))
    }

    pub fn remove_infeasibility_entry(
        &self,
        index: usize,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        let entries = &state.draft.constraints.infeasibility;
        check_index("Infeasibility entry", index, entries.len())?;
        let summary = format!(
            "Removed infeasibility entry for action: {}",
            entries[index].action
        );
        Ok(state.mutate(updated_by, summary, |draft| {
            draft.constraints.infeasibility.remove(index);
        }))
    }

    // ==================== Fact exclusions ====================

    pub fn add_fact_exclusion(
        &self,
        facts: BTreeSet<String>,
        created_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        if state
            .draft
            .constraints
            .fact_exclusions
            .iter()
            .any(|g| g.facts == facts)
        {
            return Err(StoreError::DuplicateFactExclusion {
                facts: facts.into_iter().collect(),
            });
        }
        let summary = format!("Added fact exclusion group: [{}]", join_tokens(&facts));
        let group = FactExclusionGroup {
            facts,
            provenance: Provenance::new(created_by, Utc::now()),
        };
        Ok(state.mutate(created_by, summary, move |draft| {
            draft.constraints.fact_exclusions.push(group)
        }))
    }

    pub fn update_fact_exclusion(
        &self,
        index: usize,
        facts: BTreeSet<String>,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        check_index(
            "Fact exclusion",
            index,
            state.draft.constraints.fact_exclusions.len(),
        )?;
        let summary = format!(
            "Updated fact exclusion group at index {}: [{}]",
            index,
            join_tokens(&facts)
        );
        Ok(state.mutate(updated_by, summary, move |draft| {
            draft.constraints.fact_exclusions[index].facts = facts;
        }))
    }

    pub fn remove_fact_exclusion(
        &self,
        index: usize,
        updated_by: &str,
    ) -> StoreResult<DraftProposals> {
        let mut state = self.lock()?;
        let groups = &state.draft.constraints.fact_exclusions;
        check_index("Fact exclusion", index, groups.len())?;
        let summary = format!(
            "Removed fact exclusion group: [{}]",
            join_tokens(&groups[index].facts)
        );
        Ok(state.mutate(updated_by, summary, |draft| {
            draft.constraints.fact_exclusions.remove(index);
        }))
    }

    // ==================== Promotion ====================

    /// Installs the current candidate as the runtime and marks it verified.
    ///
    /// This is the only path that sets the status to `verified`. The draft
    /// keeps its manifest and constraint collections; its proposals and
    /// provenance rows are cleared.
    pub fn promote_candidate_to_runtime(&self, promotion: Promotion) -> StoreResult<ArtifactBundle> {
        let mut state = self.lock()?;
        let candidate = state.candidate();
        Ok(state.promote(candidate, promotion))
    }

    /// Promotes only if the current candidate still equals `verified`.
    ///
    /// Guards against draft edits made while a verifier was running on a
    /// serialized copy of the candidate.
    pub fn promote_verified_candidate(
        &self,
        verified: &ArtifactBundle,
        promotion: Promotion,
    ) -> StoreResult<ArtifactBundle> {
        let mut state = self.lock()?;
        let candidate = state.candidate();
        if !candidate.same_content(verified) {
            warn!(
                event = %Event::PromotionRefused,
                verified_revision = verified.manifest.revision,
                current_revision = state.draft.manifest.revision,
                "candidate changed during verification"
            );
            return Err(StoreError::StaleCandidate {
                verified_revision: verified.manifest.revision,
                current_revision: state.draft.manifest.revision,
            });
        }
        Ok(state.promote(candidate, promotion))
    }
}
