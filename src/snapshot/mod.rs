//! Snapshot subsystem
//!
//! A snapshot is a directory per publication holding the JSON projections
//! of a candidate bundle, plus an optional certificate. Snapshots are
//! written once and never modified; each written file is reported with a
//! CRC32 checksum.

mod checksum;
mod creator;
mod errors;
mod payload;

pub use checksum::{compute_checksum, compute_file_checksum, format_checksum, parse_checksum, verify_file_checksum};
pub use creator::{
    list_snapshots, sanitize_component, session_dir, snapshot_dir_name, snapshot_timestamp,
    verifier_input_paths, write_json_documents, write_snapshot, PublishedSnapshot, SnapshotEntry, SnapshotFile,
    SNAPSHOT_LIST_LIMIT,
};
pub use errors::{SnapshotError, SnapshotErrorCode, SnapshotResult};
pub use payload::{
    ExclusionGroupRow, FactExclusionsFile, IncompatibilityFile, InfeasibilityFile,
    InfeasibilityRow, ManifestFile, PairEntry, RuleEntry, RuleOut, RulesetFile, SnapshotPayload,
    VerifierInputs, FACT_EXCLUSIONS_FILE, INCOMPATIBILITY_FILE, INFEASIBILITY_FILE, MANIFEST_FILE,
    PROOF_REPORT_FILE, RULESET_FILE,
};
