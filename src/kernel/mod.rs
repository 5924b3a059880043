//! Kernel facade
//!
//! Single entry point for every operation. The kernel owns the session
//! manager, the token registry and the configuration. It validates tokens
//! at the boundary before a store sees any input, so a rejected request
//! never touches session state.

mod views;

pub use views::{ActiveView, RuleView, RuntimeView, ViewCounts};

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{ConfigError, KernelConfig};
use crate::conflict::{detect_conflicts, ConflictWarning};
use crate::observability::{Event, KernelMetrics, MetricsSnapshot};
use crate::publish::{PublishReport, PublishRequest, PublishResult, Publisher};
use crate::registry::{TokenRegistry, ValidationError, ValidationResult};
use crate::retrieval::{retrieve, RetrievalError, RetrievalReport, RetrievalResult};
use crate::rules::Rule;
use crate::snapshot::{list_snapshots, session_dir, SnapshotEntry, SnapshotResult, SNAPSHOT_LIST_LIMIT};
use crate::store::{
    ArtifactBundle, ArtifactStore, DraftProposals, SessionManager, StoreResult,
    VerificationStatus,
};
use crate::verify::{verify_artifacts, ArtifactDocuments, VerifyResult};

fn require_actor(actor: &str) -> ValidationResult<()> {
    if actor.trim().is_empty() {
        Err(ValidationError::EmptyIdentifier { field: "actor" })
    } else {
        Ok(())
    }
}

pub struct Kernel {
    config: KernelConfig,
    registry: Arc<TokenRegistry>,
    sessions: SessionManager,
    metrics: KernelMetrics,
}

impl Kernel {
    /// Builds a kernel, loading the configured token registry.
    pub fn new(config: KernelConfig) -> Result<Self, ConfigError> {
        let registry = config.load_registry()?;
        Ok(Self::with_registry(config, registry))
    }

    pub fn with_registry(config: KernelConfig, registry: Arc<TokenRegistry>) -> Self {
        let sessions = SessionManager::new(config.session_ttl());
        Self {
            config,
            registry,
            sessions,
            metrics: KernelMetrics::new(),
        }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn store(&self, session: &str) -> StoreResult<Arc<ArtifactStore>> {
        if session.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier { field: "session" }.into());
        }
        self.sessions.get_or_create(session)
    }

    /// Validates, then applies one draft mutation.
    fn mutate<A>(
        &self,
        session: &str,
        op: &str,
        checked: ValidationResult<()>,
        apply: A,
    ) -> StoreResult<DraftProposals>
    where
        A: FnOnce(&ArtifactStore) -> StoreResult<DraftProposals>,
    {
        if let Err(e) = checked {
            self.metrics.increment_validation_rejections();
            warn!(
                event = %Event::ValidationRejected,
                session,
                op,
                code = e.code(),
                reason = %e,
            );
            return Err(e.into());
        }
        let store = self.store(session)?;
        let draft = apply(&store)?;
        self.metrics.increment_mutations();
        Ok(draft)
    }

    fn check_replacement(&self, ruleset_version: &str, updated_by: &str, rules: &[Rule]) -> ValidationResult<()> {
        require_actor(updated_by)?;
        if ruleset_version.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier {
                field: "ruleset_version",
            });
        }
        rules.iter().try_for_each(|r| self.registry.validate_rule(r))
    }

    // ==================== Reads ====================

    pub fn draft(&self, session: &str) -> StoreResult<DraftProposals> {
        self.store(session)?.get_draft()
    }

    pub fn candidate(&self, session: &str) -> StoreResult<ArtifactBundle> {
        self.store(session)?.build_candidate_runtime_bundle()
    }

    /// Conflicts in the merged candidate, resolvable ones included.
    pub fn conflicts(&self, session: &str) -> StoreResult<Vec<ConflictWarning>> {
        Ok(detect_conflicts(&self.candidate(session)?.ruleset))
    }

    pub fn verification_status(&self, session: &str) -> StoreResult<VerificationStatus> {
        self.store(session)?.get_verification_status()
    }

    pub fn runtime_ruleset(&self, session: &str) -> StoreResult<Vec<Rule>> {
        self.store(session)?.get_runtime_ruleset()
    }

    pub fn active_view(&self, session: &str) -> StoreResult<ActiveView> {
        let store = self.store(session)?;
        let draft = store.get_draft()?;
        let conflicts = detect_conflicts(&store.build_candidate_runtime_bundle()?.ruleset);
        Ok(ActiveView::new(draft, conflicts))
    }

    pub fn runtime_view(&self, session: &str) -> StoreResult<RuntimeView> {
        let (status, runtime) = self.store(session)?.runtime_snapshot()?;
        Ok(RuntimeView::new(status, runtime))
    }

    // ==================== Rules ====================

    pub fn replace_draft(
        &self,
        session: &str,
        ruleset_version: &str,
        updated_by: &str,
        change_summary: &str,
        rules: Vec<Rule>,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "replace_draft",
            self.check_replacement(ruleset_version, updated_by, &rules),
            |store| store.replace_draft_proposals(ruleset_version, updated_by, change_summary, rules),
        )
    }

    pub fn add_rule(&self, session: &str, rule: Rule, actor: &str) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "add_rule",
            require_actor(actor).and_then(|_| self.registry.validate_rule(&rule)),
            |store| store.add_rule(rule, actor),
        )
    }

    pub fn update_rule(
        &self,
        session: &str,
        rule_id: &str,
        rule: Rule,
        actor: &str,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "update_rule",
            require_actor(actor).and_then(|_| self.registry.validate_rule(&rule)),
            |store| store.update_rule(rule_id, rule, actor),
        )
    }

    pub fn remove_rule(&self, session: &str, rule_id: &str, actor: &str) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "remove_rule",
            require_actor(actor),
            |store| store.remove_rule(rule_id, actor),
        )
    }

    // ==================== Constraints ====================

    pub fn add_incompatibility(&self, session: &str, a: &str, b: &str, actor: &str) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "add_incompatibility",
            require_actor(actor).and_then(|_| self.registry.validate_incompatibility(a, b)),
            |store| store.add_incompatibility_pair(a, b, actor),
        )
    }

    pub fn update_incompatibility(
        &self,
        session: &str,
        index: usize,
        a: &str,
        b: &str,
        actor: &str,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "update_incompatibility",
            require_actor(actor).and_then(|_| self.registry.validate_incompatibility(a, b)),
            |store| store.update_incompatibility_pair(index, a, b, actor),
        )
    }

    pub fn remove_incompatibility(&self, session: &str, index: usize, actor: &str) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "remove_incompatibility",
            require_actor(actor),
            |store| store.remove_incompatibility_pair(index, actor),
        )
    }

    pub fn add_infeasibility(
        &self,
        session: &str,
        action: &str,
        premises: BTreeSet<String>,
        actor: &str,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "add_infeasibility",
            require_actor(actor).and_then(|_| self.registry.validate_infeasibility(action, &premises)),
            |store| store.add_infeasibility_entry(action, premises, actor),
        )
    }

    pub fn update_infeasibility(
        &self,
        session: &str,
        index: usize,
        action: &str,
        premises: BTreeSet<String>,
        actor: &str,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "update_infeasibility",
            require_actor(actor).and_then(|_| self.registry.validate_infeasibility(action, &premises)),
            |store| store.update_infeasibility_entry(index, action, premises, actor),
        )
    }

    pub fn remove_infeasibility(&self, session: &str, index: usize, actor: &str) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "remove_infeasibility",
            require_actor(actor),
            |store| store.remove_infeasibility_entry(index, actor),
        )
    }

    pub fn add_fact_exclusion(
        &self,
        session: &str,
        facts: BTreeSet<String>,
        actor: &str,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "add_fact_exclusion",
            require_actor(actor).and_then(|_| self.registry.validate_fact_exclusion(&facts)),
            |store| store.add_fact_exclusion(facts, actor),
        )
    }

    pub fn update_fact_exclusion(
        &self,
        session: &str,
        index: usize,
        facts: BTreeSet<String>,
        actor: &str,
    ) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "update_fact_exclusion",
            require_actor(actor).and_then(|_| self.registry.validate_fact_exclusion(&facts)),
            |store| store.update_fact_exclusion(index, facts, actor),
        )
    }

    pub fn remove_fact_exclusion(&self, session: &str, index: usize, actor: &str) -> StoreResult<DraftProposals> {
        self.mutate(
            session,
            "remove_fact_exclusion",
            require_actor(actor),
            |store| store.remove_fact_exclusion(index, actor),
        )
    }

    // ==================== Publication and retrieval ====================

    pub fn publish(&self, session: &str, request: &PublishRequest) -> PublishResult<PublishReport> {
        let store = self.store(session)?;
        Publisher::new(&self.config, &self.metrics).publish(&store, session, request)
    }

    pub fn retrieve(
        &self,
        session: &str,
        facts: &BTreeSet<String>,
        proposed_action: Option<&str>,
    ) -> RetrievalResult<RetrievalReport> {
        let store = self.store(session)?;
        let result = retrieve(&store, &self.registry, facts, proposed_action);
        match &result {
            Ok(_) => self.metrics.increment_retrievals_served(),
            Err(RetrievalError::NotVerified { .. }) => self.metrics.increment_retrievals_refused(),
            Err(RetrievalError::Validation(_)) => self.metrics.increment_validation_rejections(),
            Err(RetrievalError::Store(_)) => {}
        }
        result
    }

    /// Snapshot directories written for `session`, newest first.
    pub fn list_snapshots(&self, session: &str) -> SnapshotResult<Vec<SnapshotEntry>> {
        list_snapshots(&session_dir(&self.config.artifact_dir, session), SNAPSHOT_LIST_LIMIT)
    }

    /// Runs the lightweight verifier on caller-supplied documents.
    pub fn verify_artifacts(&self, documents: &ArtifactDocuments, timeout_seconds: f64) -> SnapshotResult<VerifyResult> {
        let result = verify_artifacts(&self.config, documents, timeout_seconds)?;
        self.metrics.record_verification(result.ok, result.timed_out());
        Ok(result)
    }

    /// Evicts idle sessions. Returns how many were dropped.
    pub fn evict_expired(&self) -> StoreResult<usize> {
        let evicted = self.sessions.evict_expired()?;
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted idle sessions");
        }
        Ok(evicted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use tempfile::TempDir;

    fn kernel(root: &TempDir) -> Kernel {
        let config = KernelConfig {
            artifact_dir: root.path().to_path_buf(),
            ..KernelConfig::default()
        };
        Kernel::new(config).unwrap()
    }

    fn rule(id: &str, premises: &[&str], outcome: &str) -> Rule {
        Rule::new(id, premises.iter().copied(), outcome, "")
    }

    #[test]
    fn test_unknown_token_never_reaches_store() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let err = kernel
            .add_rule("s", rule("r", &["Dx.Unknown"], "Allowed(Action.ExpectantManagement)"), "u")
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::UnknownFactTokens { .. })
        ));
        assert_eq!(kernel.sessions().active_session_count().unwrap(), 0);
        assert_eq!(kernel.metrics().validation_rejections, 1);
    }

    #[test]
    fn test_malformed_outcome_rejected() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let err = kernel
            .add_rule("s", rule("r", &["Dx.Preeclampsia"], "Maybe(Action.ExpectantManagement)"), "u")
            .unwrap_err();
        assert_eq!(err.code(), "KERNEL_MALFORMED_OUTCOME");
    }

    #[test]
    fn test_empty_actor_rejected() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let err = kernel.remove_rule("s", "anything", " ").unwrap_err();
        assert_eq!(
            err,
            StoreError::Validation(ValidationError::EmptyIdentifier { field: "actor" })
        );
    }

    #[test]
    fn test_active_view_reports_candidate_conflicts() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        kernel
            .add_rule(
                "s",
                rule(
                    "zz_reject_immediate_with_edema",
                    &[
                        "Dx.Preeclampsia",
                        "DxAttr.Preeclampsia.Severe",
                        "Ctx.GA_>=34w",
                        "Ctx.PulmonaryEdema",
                    ],
                    "Rejected(Action.ImmediateDelivery)",
                ),
                "u",
            )
            .unwrap();
        let view = kernel.active_view("s").unwrap();
        assert_eq!(view.conflicts.len(), 1);
        assert!(view.conflicts[0].resolvable);
        assert_eq!(view.manifest.revision, 2);
    }

    #[test]
    fn test_sessions_do_not_share_drafts() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        kernel
            .remove_rule("a", "hg_allow_expedited_delivery_hypertensive_28", "u")
            .unwrap();
        assert_eq!(kernel.draft("a").unwrap().proposals.len(), 3);
        assert_eq!(kernel.draft("b").unwrap().proposals.len(), 4);
    }

    #[test]
    fn test_list_snapshots_after_publish() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        assert!(kernel.list_snapshots("s").unwrap().is_empty());
        kernel
            .publish("s", &PublishRequest::without_verification())
            .unwrap();
        let listed = kernel.list_snapshots("s").unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].name.starts_with("local-session--r1--"));
    }

    #[test]
    fn test_snapshot_listing_is_per_session() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        kernel
            .publish("team/a", &PublishRequest::without_verification())
            .unwrap();

        assert_eq!(kernel.list_snapshots("team/a").unwrap().len(), 1);
        assert!(kernel.list_snapshots("team a").unwrap().is_empty());
        assert!(kernel.list_snapshots("team-a").unwrap().is_empty());
    }
}
