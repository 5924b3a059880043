//! Snapshot directory creation and listing
//!
//! A snapshot directory is named `{version}--r{revision}--{timestamp}`
//! where `version` is the sanitized ruleset version and `timestamp` is
//! the UTC publication time in basic format (`20260204T113000Z`).
//!
//! Creation is exclusive: an existing directory is never reused or
//! overwritten. If a file write fails, the partially written directory is
//! removed and the I/O error is returned.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checksum::{compute_checksum, compute_file_checksum, format_checksum};
use super::errors::{SnapshotError, SnapshotResult};
use super::payload::{
    SnapshotPayload, FACT_EXCLUSIONS_FILE, INCOMPATIBILITY_FILE, INFEASIBILITY_FILE,
    MANIFEST_FILE, PROOF_REPORT_FILE, RULESET_FILE,
};

/// Default cap on listed snapshots.
pub const SNAPSHOT_LIST_LIMIT: usize = 50;

/// Basic-format UTC timestamp used in directory names.
pub fn snapshot_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

fn unsafe_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[^a-zA-Z0-9._-]+").expect("sanitizer pattern is a valid constant regex")
    })
}

/// Makes `value` safe as a single path component.
///
/// Runs of characters outside `[a-zA-Z0-9._-]` become `-`; leading and
/// trailing `-`, `.` and `_` are stripped; an empty result is `untitled`.
pub fn sanitize_component(value: &str) -> String {
    let replaced = unsafe_chars().replace_all(value.trim(), "-");
    let stripped = replaced.trim_matches(|c| c == '-' || c == '.' || c == '_');
    if stripped.is_empty() {
        "untitled".to_string()
    } else {
        stripped.to_string()
    }
}

pub fn snapshot_dir_name(version: &str, revision: u64, at: DateTime<Utc>) -> String {
    format!(
        "{}--r{}--{}",
        sanitize_component(version),
        revision,
        snapshot_timestamp(at)
    )
}

/// The four verifier documents inside `dir`: ruleset, incompatibility,
/// infeasibility, fact exclusions.
pub fn verifier_input_paths(dir: &Path) -> Vec<PathBuf> {
    [RULESET_FILE, INCOMPATIBILITY_FILE, INFEASIBILITY_FILE, FACT_EXCLUSIONS_FILE]
        .iter()
        .map(|name| dir.join(name))
        .collect()
}

/// Per-session directory under the artifact root.
///
/// Named `{sanitized id}-{crc32 of the raw id}` so ids that sanitize to
/// the same component still get distinct directories.
pub fn session_dir(root: &Path, session_id: &str) -> PathBuf {
    root.join(format!(
        "{}-{:08x}",
        sanitize_component(session_id),
        compute_checksum(session_id.as_bytes())
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub path: PathBuf,
    pub checksum: String,
}

/// A written snapshot directory and its files, keyed by role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedSnapshot {
    pub directory: PathBuf,
    pub files: BTreeMap<String, SnapshotFile>,
}

impl PublishedSnapshot {
    pub fn path_of(&self, key: &str) -> Option<&Path> {
        self.files.get(key).map(|f| f.path.as_path())
    }

    /// Arguments for the lightweight verifier, in its expected order.
    pub fn verifier_args(&self) -> Vec<PathBuf> {
        verifier_input_paths(&self.directory)
    }

    /// Writes an additional text file (e.g. a certificate) into the snapshot.
    pub fn add_text_file(&mut self, key: &str, file_name: &str, contents: &str) -> SnapshotResult<PathBuf> {
        let path = self.directory.join(file_name);
        write_file(&path, contents.as_bytes())?;
        let checksum = format_checksum(compute_file_checksum(&path)?);
        self.files.insert(
            key.to_string(),
            SnapshotFile {
                path: path.clone(),
                checksum,
            },
        );
        Ok(path)
    }
}

fn write_file(path: &Path, contents: &[u8]) -> SnapshotResult<()> {
    let mut file = File::create(path).map_err(|e| SnapshotError::io_error_at_path(path, e))?;
    file.write_all(contents)
        .map_err(|e| SnapshotError::io_error_at_path(path, e))?;
    file.sync_all()
        .map_err(|e| SnapshotError::io_error(format!("fsync failed for: {}", path.display()), e))
}

fn to_pretty_json(what: &str, value: &impl Serialize) -> SnapshotResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| SnapshotError::serialize_error(what, e))
}

fn cleanup_snapshot(path: &Path) {
    if path.exists() {
        let _ = fs::remove_dir_all(path);
    }
}

/// Creates a new snapshot directory under `session_dir` and writes every
/// projection into it.
pub fn write_snapshot(session_dir: &Path, payload: &SnapshotPayload) -> SnapshotResult<PublishedSnapshot> {
    fs::create_dir_all(session_dir).map_err(|e| {
        SnapshotError::io_error(
            format!("Failed to create session directory: {}", session_dir.display()),
            e,
        )
    })?;

    let directory = session_dir.join(snapshot_dir_name(
        &payload.manifest.ruleset_version,
        payload.manifest.revision,
        payload.manifest.published_at,
    ));
    match fs::create_dir(&directory) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(SnapshotError::already_exists(&directory));
        }
        Err(e) => {
            return Err(SnapshotError::io_error(
                format!("Failed to create snapshot directory: {}", directory.display()),
                e,
            ));
        }
    }

    match write_payload_files(&directory, payload) {
        Ok(files) => Ok(PublishedSnapshot { directory, files }),
        Err(e) => {
            cleanup_snapshot(&directory);
            Err(e)
        }
    }
}

fn write_payload_files(
    directory: &Path,
    payload: &SnapshotPayload,
) -> SnapshotResult<BTreeMap<String, SnapshotFile>> {
    let inputs = &payload.inputs;
    let documents: [(&str, &str, String); 6] = [
        ("manifest", MANIFEST_FILE, to_pretty_json("manifest", &payload.manifest)?),
        ("ruleset", RULESET_FILE, to_pretty_json("ruleset", &inputs.ruleset)?),
        (
            "incompatibility",
            INCOMPATIBILITY_FILE,
            to_pretty_json("incompatibility", &inputs.incompatibility)?,
        ),
        (
            "infeasibility",
            INFEASIBILITY_FILE,
            to_pretty_json("infeasibility", &inputs.infeasibility)?,
        ),
        (
            "fact_exclusions",
            FACT_EXCLUSIONS_FILE,
            to_pretty_json("fact exclusions", &inputs.fact_exclusions)?,
        ),
        (
            "proof_report",
            PROOF_REPORT_FILE,
            to_pretty_json("proof report", &payload.proof_report)?,
        ),
    ];

    let mut files = BTreeMap::new();
    for (key, file_name, contents) in documents {
        let path = directory.join(file_name);
        write_file(&path, contents.as_bytes())?;
        let checksum = format_checksum(compute_file_checksum(&path)?);
        files.insert(key.to_string(), SnapshotFile { path, checksum });
    }
    Ok(files)
}

/// Writes arbitrary JSON documents under fixed names into `directory`.
///
/// Used to stage caller-supplied verifier inputs.
pub fn write_json_documents(directory: &Path, documents: &[(&str, &Value)]) -> SnapshotResult<Vec<PathBuf>> {
    documents
        .iter()
        .map(|(file_name, value)| {
            let path = directory.join(file_name);
            let contents =
                serde_json::to_string(value).map_err(|e| SnapshotError::serialize_error(file_name, e))?;
            write_file(&path, contents.as_bytes())?;
            Ok(path)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub name: String,
    pub directory: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
}

/// Snapshot directories of a session, by name descending, at most `limit`.
///
/// A session that never published has no directory and yields an empty list.
pub fn list_snapshots(session_dir: &Path, limit: usize) -> SnapshotResult<Vec<SnapshotEntry>> {
    if !session_dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(session_dir).map_err(|e| SnapshotError::io_error_at_path(session_dir, e))?;

    let mut snapshots = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SnapshotError::io_error_at_path(session_dir, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let created_at = entry
            .metadata()
            .ok()
            .and_then(|m| m.created().or_else(|_| m.modified()).ok())
            .map(DateTime::<Utc>::from);
        snapshots.push(SnapshotEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            directory: path,
            created_at,
        });
    }

    snapshots.sort_by(|a, b| b.name.cmp(&a.name));
    snapshots.truncate(limit);
    Ok(snapshots)
}
