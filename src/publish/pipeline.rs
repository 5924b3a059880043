use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::certificate::{check_invariants, generate_certificate, CertificateInput, InvariantReport, CERTIFICATE_FILE};
use crate::config::KernelConfig;
use crate::conflict::{detect_conflicts, unresolvable};
use crate::observability::{Event, KernelMetrics, ObservationScope};
use crate::snapshot::{session_dir, write_snapshot, SnapshotPayload};
use crate::store::{ArtifactBundle, ArtifactStore, Promotion};
use crate::verify::{verifier_for, VerifyMode, VerifyResult};

use super::errors::{PublishError, PublishResult};
use super::{PublishReport, PublishRequest};

/// Runs publications for one kernel configuration.
pub struct Publisher<'a> {
    config: &'a KernelConfig,
    metrics: &'a KernelMetrics,
}

impl<'a> Publisher<'a> {
    pub fn new(config: &'a KernelConfig, metrics: &'a KernelMetrics) -> Self {
        Self { config, metrics }
    }

    /// Publishes the session's current candidate.
    pub fn publish(
        &self,
        store: &ArtifactStore,
        session_id: &str,
        request: &PublishRequest,
    ) -> PublishResult<PublishReport> {
        let scope = ObservationScope::new(Event::Publish, session_id);
        match self.run(store, session_id, request) {
            Ok(report) => {
                scope.complete(if report.runtime_promoted {
                    "promoted"
                } else {
                    "written"
                });
                Ok(report)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn run(
        &self,
        store: &ArtifactStore,
        session_id: &str,
        request: &PublishRequest,
    ) -> PublishResult<PublishReport> {
        let candidate = store.build_candidate_runtime_bundle()?;
        info!(
            event = %Event::CandidateBuilt,
            session = session_id,
            revision = candidate.manifest.revision,
            rules = candidate.ruleset.len(),
        );

        let conflicts = detect_conflicts(&candidate.ruleset);
        if !conflicts.is_empty() {
            info!(
                event = %Event::ConflictsDetected,
                session = session_id,
                count = conflicts.len(),
            );
        }
        let blocking = unresolvable(&conflicts);
        if !blocking.is_empty() {
            self.metrics.increment_publishes_rejected();
            warn!(
                event = %Event::PublishRejected,
                session = session_id,
                unresolvable = blocking.len(),
                "unresolvable conflicts in candidate"
            );
            return Err(PublishError::UnresolvableConflicts {
                conflicts: blocking,
            });
        }

        let payload = SnapshotPayload::from_bundle(&candidate, &self.config.domain, Utc::now());
        let mut snapshot = write_snapshot(
            &session_dir(&self.config.artifact_dir, session_id),
            &payload,
        )?;
        self.metrics.increment_snapshots();
        info!(
            event = %Event::SnapshotCreated,
            session = session_id,
            directory = %snapshot.directory.display(),
            revision = payload.manifest.revision,
        );

        let cert_input = CertificateInput::from(&payload.inputs);
        let mut certificate_generated = false;
        if request.mode == VerifyMode::Certificate {
            let path = snapshot.add_text_file(
                "certificate",
                CERTIFICATE_FILE,
                &generate_certificate(&cert_input),
            )?;
            certificate_generated = true;
            info!(
                event = %Event::CertificateWritten,
                session = session_id,
                path = %path.display(),
            );
        }

        let mut precheck = None;
        let mut verify_result = None;
        let mut runtime_promoted = false;

        if request.verify {
            precheck = check_invariants(&cert_input);
            let verifier = verifier_for(request.mode, self.config);
            let result = verifier.verify(&snapshot.directory, request.timeout_seconds);
            self.metrics
                .record_verification(result.ok, result.timed_out());

            if result.ok {
                let verified_by = request
                    .published_by
                    .clone()
                    .unwrap_or_else(|| candidate.manifest.updated_by.clone());
                let promotion = Promotion::new(verified_by)
                    .with_snapshot_dir(snapshot.directory.clone())
                    .with_verified_at(Utc::now())
                    .with_proof_report(proof_report(
                        request.mode,
                        &result,
                        precheck.as_ref(),
                        &candidate,
                    ));
                store.promote_verified_candidate(&candidate, promotion)?;
                self.metrics.increment_promotions();
                runtime_promoted = true;
            }
            verify_result = Some(result);
        }

        Ok(PublishReport {
            directory: snapshot.directory,
            manifest: payload.manifest,
            files: snapshot.files,
            conflicts,
            verify_mode: request.mode,
            verify_result,
            certificate_generated,
            runtime_promoted,
            precheck,
        })
    }
}

fn proof_report(
    mode: VerifyMode,
    result: &VerifyResult,
    precheck: Option<&InvariantReport>,
    candidate: &ArtifactBundle,
) -> Value {
    json!({
        "mode": mode,
        "revision": candidate.manifest.revision,
        "ruleset_version": candidate.manifest.ruleset_version,
        "verify": result,
        "precheck": precheck,
    })
}
