//! Lean 4 source emitter.
//!
//! The generated file depends only on the Lean core library. Every
//! invariant is a closed `Bool` computation over literal data, discharged
//! with `native_decide`.

use std::fmt::Write;

use crate::rules::VerdictKind;

use super::CertificateInput;

pub const CERTIFICATE_FILE: &str = "certificate.lean";

const NAMESPACE: &str = "RuleKernel.Certificate";

fn lean_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Flattens caller text onto a single `--` comment line.
fn comment_text(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

fn lean_str_list(items: &[String]) -> String {
    let inner: Vec<String> = items.iter().map(|s| lean_str(s)).collect();
    format!("[{}]", inner.join(", "))
}

fn kind_ctor(kind: VerdictKind) -> &'static str {
    match kind {
        VerdictKind::Obligated => ".Obligated",
        VerdictKind::Allowed => ".Allowed",
        VerdictKind::Disallowed => ".Disallowed",
        VerdictKind::Rejected => ".Rejected",
    }
}

/// Emits `name : ty :=` followed by a one-item-per-line list literal.
fn emit_list(out: &mut String, name: &str, ty: &str, items: &[String]) {
    let _ = writeln!(out, "def {} : {} :=", name, ty);
    if items.is_empty() {
        let _ = writeln!(out, "  []");
    } else {
        let _ = writeln!(out, "  [");
        for (i, item) in items.iter().enumerate() {
            let comma = if i + 1 < items.len() { "," } else { "" };
            let _ = writeln!(out, "    {}{}", item, comma);
        }
        let _ = writeln!(out, "  ]");
    }
    out.push('\n');
}

const PRELUDE: &str = r#"inductive Kind where
  | Obligated
  | Allowed
  | Disallowed
  | Rejected
  deriving DecidableEq, Repr

structure CertRule where
  premises : List String
  kind : Kind
  action : String

def subsetB (xs ys : List String) : Bool :=
  xs.all (fun x => ys.contains x)
"#;

const CHECKS: &str = r#"def incompatibleB (a b : String) : Bool :=
  certIncompatPairs.any (fun p => (p.1 == a && p.2 == b) || (p.1 == b && p.2 == a))

def infeasibleB (a : String) (F : List String) : Bool :=
  certInfeasEntries.any (fun e => e.1 == a && subsetB e.2 F)

def validFactSetB (F : List String) : Bool :=
  certExclusionGroups.all (fun g => !(subsetB g F))

def powerset : List String → List (List String)
  | [] => [[]]
  | x :: xs =>
    let rest := powerset xs
    rest ++ rest.map (x :: ·)

def certFactSets : List (List String) :=
  (powerset certFacts).filter validFactSetB

def derived (F : List String) : List CertRule :=
  certRules.filter (fun r => subsetB r.premises F)

def hasVerdict (D : List CertRule) (k : Kind) (a : String) : Bool :=
  D.any (fun r => r.kind == k && r.action == a)

def obligatedActions (D : List CertRule) : List String :=
  certActions.filter (fun a => hasVerdict D .Obligated a)

def noContradictionB (D : List CertRule) : Bool :=
  certActions.all (fun a =>
    !((hasVerdict D .Obligated a && hasVerdict D .Rejected a) ||
      (hasVerdict D .Allowed a && hasVerdict D .Rejected a)))

def noIncompatibleObligationsB (F : List String) (D : List CertRule) : Bool :=
  let obs := obligatedActions D
  obs.all (fun a => obs.all (fun b => !(incompatibleB a b))) &&
    obs.all (fun a => !(infeasibleB a F))

def oughtImpliesCanB (F : List String) (D : List CertRule) : Bool :=
  (obligatedActions D).all (fun a => !(infeasibleB a F))

def certNoContra : Bool :=
  certFactSets.all (fun F => noContradictionB (derived F))

def certNoIncompat : Bool :=
  certFactSets.all (fun F => noIncompatibleObligationsB F (derived F))

def certOughtCan : Bool :=
  certFactSets.all (fun F => oughtImpliesCanB F (derived F))

/-- No contradictory verdicts for any valid subset of the fact universe. -/
theorem cert_no_contradictory_verdicts : certNoContra = true := by native_decide

/-- No incompatible or infeasible obligations for any valid subset of the fact universe. -/
theorem cert_no_incompatible_obligations : certNoIncompat = true := by native_decide

/-- Every obligated action is feasible for any valid subset of the fact universe. -/
theorem cert_ought_implies_can : certOughtCan = true := by native_decide
"#;

/// Renders the certificate source for `input`.
pub fn generate_certificate(input: &CertificateInput) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "-- Proof certificate for ruleset: {} v{}",
        comment_text(&input.domain),
        comment_text(&input.version)
    );
    let _ = writeln!(
        out,
        "-- Facts: {}, Actions: {}, Rules: {}",
        input.facts.len(),
        input.actions.len(),
        input.rules.len()
    );
    let _ = writeln!(
        out,
        "-- Incompatibility pairs: {}, Infeasibility entries: {}, Exclusion groups: {}",
        input.incompatibility.len(),
        input.infeasibility.len(),
        input.exclusion_groups.len()
    );
    let _ = writeln!(out, "--");
    let _ = writeln!(out, "-- Generated file. If the checker accepts it, the three invariants");
    let _ = writeln!(out, "-- hold for every subset of the fact universe that respects the");
    let _ = writeln!(out, "-- exclusion groups.");
    out.push('\n');
    let _ = writeln!(out, "namespace {}", NAMESPACE);
    out.push('\n');
    out.push_str(PRELUDE);
    out.push('\n');

    let rules: Vec<String> = input
        .rules
        .iter()
        .map(|r| {
            format!(
                "{{ premises := {}, kind := {}, action := {} }}",
                lean_str_list(&r.premises),
                kind_ctor(r.kind),
                lean_str(&r.action)
            )
        })
        .collect();
    emit_list(&mut out, "certRules", "List CertRule", &rules);

    let _ = writeln!(out, "def certActions : List String := {}", lean_str_list(&input.actions));
    out.push('\n');
    let _ = writeln!(out, "def certFacts : List String := {}", lean_str_list(&input.facts));
    out.push('\n');

    let pairs: Vec<String> = input
        .incompatibility
        .iter()
        .map(|(a, b)| format!("({}, {})", lean_str(a), lean_str(b)))
        .collect();
    emit_list(&mut out, "certIncompatPairs", "List (String × String)", &pairs);

    let entries: Vec<String> = input
        .infeasibility
        .iter()
        .map(|(action, premises)| format!("({}, {})", lean_str(action), lean_str_list(premises)))
        .collect();
    emit_list(&mut out, "certInfeasEntries", "List (String × List String)", &entries);

    let groups: Vec<String> = input
        .exclusion_groups
        .iter()
        .map(|g| lean_str_list(g))
        .collect();
    emit_list(&mut out, "certExclusionGroups", "List (List String)", &groups);

    out.push_str(CHECKS);
    out.push('\n');
    let _ = writeln!(out, "end {}", NAMESPACE);
    out
}
