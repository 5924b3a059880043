//! CLI argument definitions using clap
//!
//! Commands:
//! - rulekernel serve
//! - rulekernel certificate --snapshot <dir> [--output <file>]
//! - rulekernel verify --snapshot <dir> [--mode lightweight|certificate] [--timeout <secs>]
//! - rulekernel snapshots --session <id>
//! - rulekernel registry

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::publish::DEFAULT_TIMEOUT_SECONDS;
use crate::verify::VerifyMode;

/// Verified rule kernel
#[derive(Parser, Debug)]
#[command(name = "rulekernel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to stderr as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Lightweight,
    Certificate,
}

impl From<ModeArg> for VerifyMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Lightweight => VerifyMode::Lightweight,
            ModeArg::Certificate => VerifyMode::Certificate,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve JSON-lines requests on stdin, one response per line on stdout
    Serve,

    /// Emit the certificate source for an existing snapshot
    Certificate {
        /// Snapshot directory
        #[arg(long)]
        snapshot: PathBuf,

        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Re-verify an existing snapshot without modifying it
    Verify {
        /// Snapshot directory
        #[arg(long)]
        snapshot: PathBuf,

        #[arg(long, value_enum, default_value_t = ModeArg::Lightweight)]
        mode: ModeArg,

        /// Timeout in seconds, clamped per mode
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
        timeout: f64,
    },

    /// List snapshot directories written for a session, newest first
    Snapshots {
        #[arg(long)]
        session: String,
    },

    /// Print the token registry the kernel validates against
    Registry,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
