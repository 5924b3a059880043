//! API handler
//!
//! Parses one request, dispatches it to the kernel and wraps the outcome
//! in a response envelope. The kernel serializes per-session access, so
//! the handler holds no lock of its own.
//!
//! Flow per request:
//! 1. Parse the envelope
//! 2. Dispatch to the kernel operation named by `op`
//! 3. Serialize the result as `data`, or the error as `code`/`message`

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::kernel::Kernel;

use super::errors::{ApiError, ApiResult};
use super::request::{artifact_documents, publish_request, Request, DEFAULT_ARTIFACT_TIMEOUT_SECONDS};
use super::response::Response;

fn to_data<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ApiError::internal(format!("Failed to serialize response: {}", e)))
}

/// Request handler bound to one kernel
pub struct ApiHandler<'a> {
    kernel: &'a Kernel,
}

impl<'a> ApiHandler<'a> {
    pub fn new(kernel: &'a Kernel) -> Self {
        Self { kernel }
    }

    /// Handle a raw JSON request string
    pub fn handle(&self, json_request: &str) -> Response {
        let request = match Request::parse(json_request) {
            Ok(r) => r,
            Err(e) => {
                warn!(code = e.code(), reason = e.message(), "rejected request");
                return Response::error(&e);
            }
        };

        let op = request.op();
        match self.dispatch(request) {
            Ok(data) => {
                debug!(op, "request handled");
                Response::success(data)
            }
            Err(e) => {
                debug!(op, code = e.code(), status = e.status(), "request failed");
                Response::error(&e)
            }
        }
    }

    /// Runs a parsed request against the kernel.
    pub fn dispatch(&self, request: Request) -> ApiResult<Value> {
        let k = self.kernel;
        match request {
            Request::GetDraft { session } => to_data(&k.draft(&session)?),
            Request::GetCandidate { session } => to_data(&k.candidate(&session)?),
            Request::GetConflicts { session } => to_data(&k.conflicts(&session)?),
            Request::GetVerificationStatus { session } => {
                to_data(&k.verification_status(&session)?)
            }
            Request::GetRuntimeRuleset { session } => to_data(&k.runtime_ruleset(&session)?),
            Request::ActiveView { session } => to_data(&k.active_view(&session)?),
            Request::RuntimeView { session } => to_data(&k.runtime_view(&session)?),

            Request::ReplaceDraft {
                session,
                ruleset_version,
                updated_by,
                change_summary,
                rules,
            } => to_data(&k.replace_draft(
                &session,
                &ruleset_version,
                &updated_by,
                &change_summary,
                rules,
            )?),
            Request::AddRule {
                session,
                rule,
                actor,
            } => to_data(&k.add_rule(&session, rule, &actor)?),
            Request::UpdateRule {
                session,
                rule_id,
                rule,
                actor,
            } => to_data(&k.update_rule(&session, &rule_id, rule, &actor)?),
            Request::RemoveRule {
                session,
                rule_id,
                actor,
            } => to_data(&k.remove_rule(&session, &rule_id, &actor)?),

            Request::AddIncompatibility {
                session,
                a,
                b,
                actor,
            } => to_data(&k.add_incompatibility(&session, &a, &b, &actor)?),
            Request::UpdateIncompatibility {
                session,
                index,
                a,
                b,
                actor,
            } => to_data(&k.update_incompatibility(&session, index, &a, &b, &actor)?),
            Request::RemoveIncompatibility {
                session,
                index,
                actor,
            } => to_data(&k.remove_incompatibility(&session, index, &actor)?),
            Request::AddInfeasibility {
                session,
                action,
                premises,
                actor,
            } => to_data(&k.add_infeasibility(&session, &action, premises, &actor)?),
            Request::UpdateInfeasibility {
                session,
                index,
                action,
                premises,
                actor,
            } => to_data(&k.update_infeasibility(&session, index, &action, premises, &actor)?),
            Request::RemoveInfeasibility {
                session,
                index,
                actor,
            } => to_data(&k.remove_infeasibility(&session, index, &actor)?),
            Request::AddFactExclusion {
                session,
                facts,
                actor,
            } => to_data(&k.add_fact_exclusion(&session, facts, &actor)?),
            Request::UpdateFactExclusion {
                session,
                index,
                facts,
                actor,
            } => to_data(&k.update_fact_exclusion(&session, index, facts, &actor)?),
            Request::RemoveFactExclusion {
                session,
                index,
                actor,
            } => to_data(&k.remove_fact_exclusion(&session, index, &actor)?),

            Request::Publish {
                session,
                verify,
                mode,
                timeout_seconds,
                published_by,
            } => {
                let request = publish_request(verify, mode, timeout_seconds, published_by);
                to_data(&k.publish(&session, &request)?)
            }
            Request::Retrieve {
                session,
                facts,
                proposed_action,
            } => to_data(&k.retrieve(&session, &facts, proposed_action.as_deref())?),
            Request::ListSnapshots { session } => to_data(&k.list_snapshots(&session)?),
            Request::VerifyArtifacts {
                ruleset,
                incompatibility,
                infeasibility,
                fact_exclusions,
                timeout_seconds,
            } => {
                let documents =
                    artifact_documents(ruleset, incompatibility, infeasibility, fact_exclusions);
                let timeout = timeout_seconds.unwrap_or(DEFAULT_ARTIFACT_TIMEOUT_SECONDS);
                to_data(&k.verify_artifacts(&documents, timeout)?)
            }

            Request::Registry => {
                let registry = k.registry();
                Ok(json!({
                    "facts": registry.facts(),
                    "actions": registry.actions(),
                    "verdict_kinds": registry.verdict_kinds(),
                }))
            }
            Request::Metrics => to_data(&k.metrics()),
            Request::EvictExpired => Ok(json!({ "evicted": k.evict_expired()? })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use tempfile::TempDir;

    fn kernel(root: &TempDir) -> Kernel {
        Kernel::new(KernelConfig {
            artifact_dir: root.path().to_path_buf(),
            ..KernelConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_get_draft_returns_seed() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let handler = ApiHandler::new(&kernel);

        let resp = handler.handle(r#"{"op":"get_draft","session":"s1"}"#);
        assert!(resp.is_success());
        let data = resp.data().unwrap();
        assert_eq!(data["proposals"].as_array().unwrap().len(), 4);
        assert_eq!(data["manifest"]["revision"], 1);
    }

    #[test]
    fn test_duplicate_rule_maps_to_store_code() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let handler = ApiHandler::new(&kernel);

        let resp = handler.handle(
            r#"{"op":"add_rule","session":"s1","actor":"a","rule":{
                "rule_id":"hg_obligate_expedited_delivery_placental_abruption",
                "premises":["Dx.PlacentalAbruption"],
                "outcome":"Obligated(Action.ExpeditedDelivery)"}}"#,
        );
        assert_eq!(resp.error_code(), Some("KERNEL_DUPLICATE_RULE"));
    }

    #[test]
    fn test_retrieve_before_verification_is_refused() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let handler = ApiHandler::new(&kernel);

        let resp =
            handler.handle(r#"{"op":"retrieve","session":"s1","facts":["Dx.PlacentalAbruption"]}"#);
        assert_eq!(resp.error_code(), Some("KERNEL_RUNTIME_NOT_VERIFIED"));
    }

    #[test]
    fn test_registry_and_metrics() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let handler = ApiHandler::new(&kernel);

        let registry = handler.handle(r#"{"op":"registry"}"#);
        let data = registry.data().unwrap();
        assert!(data["facts"]
            .as_array()
            .unwrap()
            .contains(&json!("Dx.Preeclampsia")));
        assert_eq!(data["verdict_kinds"].as_array().unwrap().len(), 4);

        handler.handle(r#"{"op":"remove_rule","session":"s","rule_id":"nope","actor":"a"}"#);
        let metrics = handler.handle(r#"{"op":"metrics"}"#);
        assert!(metrics.is_success());
    }

    #[test]
    fn test_unverified_publish_reports_files() {
        let root = TempDir::new().unwrap();
        let kernel = kernel(&root);
        let handler = ApiHandler::new(&kernel);

        let resp = handler.handle(r#"{"op":"publish","session":"s1","verify":false}"#);
        let data = resp.data().unwrap();
        assert_eq!(data["runtime_promoted"], false);
        assert!(data["verify_result"].is_null());
        assert_eq!(data["files"].as_object().unwrap().len(), 6);

        let listed = handler.handle(r#"{"op":"list_snapshots","session":"s1"}"#);
        assert_eq!(listed.data().unwrap().as_array().unwrap().len(), 1);
    }
}
