//! CLI module for rulekernel
//!
//! Provides command-line interface for:
//! - serve: JSON-lines request loop over stdin/stdout
//! - certificate: certificate source for an existing snapshot
//! - verify: re-verify an existing snapshot
//! - snapshots: list a session's snapshot directories
//! - registry: dump the token registry

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, ModeArg};
pub use commands::{certificate, load_config, registry, run, run_command, serve, snapshots, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{serve_lines, write_error, write_response};
