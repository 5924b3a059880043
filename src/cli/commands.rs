//! CLI command implementations
//!
//! Every command loads configuration first (defaults, `--config`, then
//! environment). Only `serve` builds a kernel; the other commands read
//! snapshot directories or the registry directly and exit.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde_json::json;
use tracing::info;

use crate::api::ApiHandler;
use crate::certificate::{generate_certificate, CertificateInput};
use crate::config::KernelConfig;
use crate::kernel::Kernel;
use crate::observability::{init_logging, Event};
use crate::snapshot::{list_snapshots, session_dir, VerifierInputs, SNAPSHOT_LIST_LIMIT};
use crate::verify::{verify_snapshot_dir, VerifyMode};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{serve_lines, write_response};

/// Parse arguments, install logging and run the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.json_logs);
    let config = load_config(cli.config.as_deref())?;
    run_command(&config, cli.command)
}

pub fn load_config(path: Option<&Path>) -> CliResult<KernelConfig> {
    let config = KernelConfig::load(path)?;
    info!(
        event = %Event::ConfigLoaded,
        artifact_dir = %config.artifact_dir.display(),
        domain = %config.domain,
        session_ttl_secs = config.session_ttl_secs,
    );
    Ok(config)
}

/// Run the appropriate command based on CLI args
pub fn run_command(config: &KernelConfig, cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve => serve(config),
        Command::Certificate { snapshot, output } => match output {
            Some(path) => certificate_to_file(&snapshot, &path),
            None => certificate(&snapshot, &mut io::stdout().lock()),
        },
        Command::Verify {
            snapshot,
            mode,
            timeout,
        } => verify(config, &snapshot, mode.into(), timeout, &mut io::stdout().lock()),
        Command::Snapshots { session } => snapshots(config, &session, &mut io::stdout().lock()),
        Command::Registry => registry(config, &mut io::stdout().lock()),
    }
}

/// Serve JSON-lines requests until stdin closes.
pub fn serve(config: &KernelConfig) -> CliResult<()> {
    let kernel = Kernel::new(config.clone())?;
    let handler = ApiHandler::new(&kernel);
    info!(
        event = %Event::ServeStart,
        facts = kernel.registry().facts().len(),
        actions = kernel.registry().actions().len(),
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let handled = serve_lines(&handler, stdin.lock(), &mut stdout)?;

    info!(event = %Event::ServeStop, requests = handled);
    Ok(())
}

/// Write the certificate source for `snapshot` to `output`.
pub fn certificate<W: Write>(snapshot: &Path, output: &mut W) -> CliResult<()> {
    let inputs = VerifierInputs::read_from_dir(snapshot)?;
    let source = generate_certificate(&CertificateInput::from(&inputs));
    output.write_all(source.as_bytes())?;
    output.flush()?;
    Ok(())
}

fn certificate_to_file(snapshot: &Path, path: &Path) -> CliResult<()> {
    let mut file = fs::File::create(path)
        .map_err(|e| CliError::io_error(format!("Failed to create {}: {}", path.display(), e)))?;
    certificate(snapshot, &mut file)?;
    info!(event = %Event::CertificateWritten, path = %path.display());
    Ok(())
}

/// Verify `snapshot` and print the result. A verifier that ran and did
/// not succeed is a CLI error so the exit status reflects it.
pub fn verify<W: Write>(
    config: &KernelConfig,
    snapshot: &Path,
    mode: VerifyMode,
    timeout: f64,
    output: &mut W,
) -> CliResult<()> {
    let result = verify_snapshot_dir(config, snapshot, mode, timeout)?;
    write_response(output, serde_json::to_value(&result)?)?;
    if result.ok {
        Ok(())
    } else {
        Err(CliError::verification_failed(format!(
            "{} verification of {} failed (exit code {})",
            mode,
            snapshot.display(),
            result.exit_code
        )))
    }
}

pub fn snapshots<W: Write>(config: &KernelConfig, session: &str, output: &mut W) -> CliResult<()> {
    let entries = list_snapshots(&session_dir(&config.artifact_dir, session), SNAPSHOT_LIST_LIMIT)?;
    write_response(output, serde_json::to_value(&entries)?)
}

pub fn registry<W: Write>(config: &KernelConfig, output: &mut W) -> CliResult<()> {
    let registry = config.load_registry()?;
    write_response(
        output,
        json!({
            "facts": registry.facts(),
            "actions": registry.actions(),
            "verdict_kinds": registry.verdict_kinds(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::PublishRequest;
    use serde_json::Value;
    use tempfile::TempDir;

    fn config(root: &TempDir) -> KernelConfig {
        KernelConfig {
            artifact_dir: root.path().to_path_buf(),
            ..KernelConfig::default()
        }
    }

    fn published(config: &KernelConfig) -> std::path::PathBuf {
        let kernel = Kernel::new(config.clone()).unwrap();
        kernel
            .publish("s1", &PublishRequest::without_verification())
            .unwrap()
            .directory
    }

    #[test]
    fn test_certificate_from_snapshot() {
        let root = TempDir::new().unwrap();
        let config = config(&root);
        let dir = published(&config);

        let mut out = Vec::new();
        certificate(&dir, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("theorem cert_no_contradictory_verdicts"));
        assert!(text.contains("hg_obligate_expedited_delivery_placental_abruption"));
    }

    #[test]
    fn test_certificate_missing_snapshot() {
        let root = TempDir::new().unwrap();
        let mut out = Vec::new();
        let err = certificate(&root.path().join("absent"), &mut out).unwrap_err();
        assert_eq!(err.code_str(), "KERNEL_CLI_SNAPSHOT_ERROR");
    }

    #[test]
    fn test_snapshots_lists_session() {
        let root = TempDir::new().unwrap();
        let config = config(&root);
        published(&config);

        let mut out = Vec::new();
        snapshots(&config, "s1", &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["data"].as_array().unwrap().len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_verify_exit_status_follows_result() {
        let root = TempDir::new().unwrap();
        let mut config = config(&root);
        config.verify_command = "true".into();
        let dir = published(&config);

        let mut out = Vec::new();
        verify(&config, &dir, VerifyMode::Lightweight, 5.0, &mut out).unwrap();

        config.verify_command = "false".into();
        let mut out = Vec::new();
        let err = verify(&config, &dir, VerifyMode::Lightweight, 5.0, &mut out).unwrap_err();
        assert_eq!(err.code_str(), "KERNEL_CLI_VERIFICATION_FAILED");
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["data"]["ok"], false);
    }

    #[test]
    fn test_registry_dump() {
        let root = TempDir::new().unwrap();
        let mut out = Vec::new();
        registry(&config(&root), &mut out).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert!(value["data"]["actions"]
            .as_array()
            .unwrap()
            .contains(&json!("Action.ExpeditedDelivery")));
    }
}
