//! JSON-lines Serving Tests
//!
//! Drives the request loop the way `rulekernel serve` does, one request
//! per line, and checks the response envelopes line by line.

use std::io::Cursor;

use rulekernel::api::ApiHandler;
use rulekernel::cli::serve_lines;
use rulekernel::config::KernelConfig;
use rulekernel::kernel::Kernel;
use serde_json::Value;
use tempfile::TempDir;

fn kernel(root: &TempDir, verify_command: &str) -> Kernel {
    Kernel::new(KernelConfig {
        artifact_dir: root.path().to_path_buf(),
        verify_command: verify_command.to_string(),
        ..KernelConfig::default()
    })
    .unwrap()
}

fn serve(kernel: &Kernel, requests: &[&str]) -> Vec<Value> {
    let handler = ApiHandler::new(kernel);
    let input = requests.join("\n");
    let mut output = Vec::new();
    let handled = serve_lines(&handler, Cursor::new(input), &mut output).unwrap();
    assert_eq!(handled, requests.len());

    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

/// Authoring session: edit constraints, inspect conflicts, hit error paths.
#[test]
fn test_authoring_session() {
    let root = TempDir::new().unwrap();
    let kernel = kernel(&root, "true");

    let responses = serve(
        &kernel,
        &[
            r#"{"op":"add_rule","session":"ward","actor":"dr_a","rule":{"rule_id":"zz_reject_immediate_with_pulmonary_edema","premises":["Dx.Preeclampsia","DxAttr.Preeclampsia.Severe","Ctx.GA_>=34w","Ctx.PulmonaryEdema"],"outcome":"Rejected(Action.ImmediateDelivery)","note":"stabilize first"}}"#,
            r#"{"op":"get_conflicts","session":"ward"}"#,
            r#"{"op":"add_incompatibility","session":"ward","a":"Action.ExpectantManagement","b":"Action.ExpectantManagement","actor":"dr_a"}"#,
            r#"{"op":"remove_fact_exclusion","session":"ward","index":4,"actor":"dr_a"}"#,
            r#"{"op":"add_rule","session":"ward","actor":"dr_a","rule":{"rule_id":"bad","premises":["Dx.NotARealToken"],"outcome":"Allowed(Action.ExpectantManagement)"}}"#,
            r#"{"op":"active_view","session":"ward"}"#,
            r#"{"op":"rename_everything","session":"ward"}"#,
        ],
    );

    assert_eq!(responses[0]["status"], "ok");
    assert_eq!(responses[0]["data"]["manifest"]["revision"], 2);

    let conflicts = responses[1]["data"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["resolvable"], true);

    assert_eq!(responses[2]["status"], "error");
    assert_eq!(responses[3]["code"], "KERNEL_INDEX_OUT_OF_RANGE");
    assert_eq!(responses[4]["code"], "KERNEL_UNKNOWN_FACT_TOKEN");

    let view = &responses[5]["data"];
    assert_eq!(view["counts"]["rules"], 5);
    let added = view["rules"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["rule_id"] == "zz_reject_immediate_with_pulmonary_edema")
        .unwrap();
    assert_eq!(added["created_by"], "dr_a");

    assert_eq!(responses[6]["code"], "KERNEL_UNKNOWN_OPERATION");
}

/// Publish, then retrieve against the promoted runtime.
#[cfg(unix)]
#[test]
fn test_publish_then_retrieve() {
    let root = TempDir::new().unwrap();
    let kernel = kernel(&root, "true");

    let responses = serve(
        &kernel,
        &[
            r#"{"op":"retrieve","session":"ward","facts":["Dx.Preeclampsia"]}"#,
            r#"{"op":"publish","session":"ward","published_by":"dr_b"}"#,
            r#"{"op":"get_verification_status","session":"ward"}"#,
            r#"{"op":"retrieve","session":"ward","facts":["Dx.Preeclampsia","DxAttr.Preeclampsia.Severe","Ctx.GA_>=34w"],"proposed_action":"Action.ImmediateDelivery"}"#,
            r#"{"op":"runtime_view","session":"ward"}"#,
            r#"{"op":"metrics"}"#,
        ],
    );

    assert_eq!(responses[0]["code"], "KERNEL_RUNTIME_NOT_VERIFIED");

    let publish = &responses[1]["data"];
    assert_eq!(publish["runtime_promoted"], true);
    assert_eq!(publish["verify_result"]["ok"], true);
    assert_eq!(publish["verify_mode"], "lightweight");

    assert_eq!(responses[2]["data"]["status"], "verified");
    assert_eq!(responses[2]["data"]["verified_by"], "dr_b");

    let retrieval = &responses[3]["data"];
    assert_eq!(retrieval["matched_count"], 1);
    assert_eq!(retrieval["support"]["support_level"], "obligated");
    assert_eq!(
        retrieval["support"]["supporting_rule_ids"][0],
        "hg_obligate_immediate_delivery_severe_pe_34"
    );

    assert_eq!(responses[4]["data"]["counts"]["rules"], 4);
    assert_eq!(responses[4]["data"]["proof_report"]["verify"]["ok"], true);

    let metrics = &responses[5]["data"];
    assert_eq!(metrics["promotions"], 1);
    assert_eq!(metrics["retrievals_refused"], 1);
    assert_eq!(metrics["retrievals_served"], 1);
}

/// Standalone verification of caller-supplied documents.
#[cfg(unix)]
#[test]
fn test_verify_artifacts_request() {
    let root = TempDir::new().unwrap();
    let kernel = kernel(&root, "false");

    let responses = serve(
        &kernel,
        &[r#"{"op":"verify_artifacts","ruleset":{"rules":[]},"incompatibility":{"pairs":[]},"infeasibility":{"entries":[]},"timeout_seconds":5}"#],
    );
    let result = &responses[0]["data"];
    assert_eq!(result["ok"], false);
    assert_eq!(result["exitCode"], 1);
}
