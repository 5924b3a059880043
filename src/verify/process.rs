//! Bounded subprocess execution.
//!
//! The child runs with piped stdout/stderr drained by background threads
//! into tail buffers, while the caller polls `try_wait` against a
//! deadline. On timeout the child is killed and reaped before returning.

use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::observability::Event;

use super::{VerifyFailure, VerifyResult};

/// Bytes kept from each stream of a completed run.
pub const OUTPUT_TAIL_BYTES: usize = 50_000;

/// Bytes kept from each stream of a run that timed out.
pub const TIMEOUT_TAIL_BYTES: usize = 10_000;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long reader threads get to hit EOF once the child is gone.
const READER_GRACE: Duration = Duration::from_millis(250);

/// Keeps only the last `cap` bytes written to it.
#[derive(Debug)]
struct TailBuffer {
    cap: usize,
    bytes: Vec<u8>,
}

impl TailBuffer {
    fn new(cap: usize) -> Self {
        Self {
            cap,
            bytes: Vec::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > self.cap {
            let excess = self.bytes.len() - self.cap;
            self.bytes.drain(..excess);
        }
    }
}

fn tail_string(bytes: &[u8], cap: usize) -> String {
    let start = bytes.len().saturating_sub(cap);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

type SharedTail = Arc<Mutex<TailBuffer>>;

fn drain<R: Read + Send + 'static>(source: Option<R>) -> (SharedTail, Option<JoinHandle<()>>) {
    let tail = Arc::new(Mutex::new(TailBuffer::new(OUTPUT_TAIL_BYTES)));
    let handle = source.map(|mut reader| {
        let tail = Arc::clone(&tail);
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = tail.lock() {
                            buf.push(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(_) => break,
                }
            }
        })
    });
    (tail, handle)
}

/// Joins the reader threads that finish before `until`.
///
/// A reader still blocked afterwards (a grandchild holding the pipe) is
/// detached; its tail buffer is read as-is. Returns the number detached.
fn join_readers(handles: [Option<JoinHandle<()>>; 2], until: Instant) -> usize {
    let mut pending: Vec<JoinHandle<()>> = handles.into_iter().flatten().collect();
    loop {
        let (finished, running): (Vec<_>, Vec<_>) =
            pending.into_iter().partition(JoinHandle::is_finished);
        for handle in finished {
            let _ = handle.join();
        }
        pending = running;
        if pending.is_empty() || Instant::now() >= until {
            return pending.len();
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn collect(tail: &SharedTail, cap: usize) -> String {
    match tail.lock() {
        Ok(buf) => tail_string(&buf.bytes, cap),
        Err(_) => String::new(),
    }
}

/// Locates `program` the way a shell would: paths containing a separator
/// are taken as-is, bare names are searched on `PATH`.
pub fn resolve_binary(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}

/// One external invocation with a hard deadline.
#[derive(Debug, Clone)]
pub struct BoundedCommand {
    program: PathBuf,
    args: Vec<OsString>,
    env: Vec<(String, OsString)>,
    timeout: Duration,
}

impl BoundedCommand {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Runs the command to completion or until the deadline.
    ///
    /// Never panics and never leaves the child running. Only the direct
    /// child is killed: a grandchild that keeps the output pipes open
    /// leaves its reader thread detached after a short grace period, so
    /// `run` still returns on time.
    pub fn run(&self) -> VerifyResult {
        let started = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            command.env(key, value);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    event = %Event::VerifyUnavailable,
                    program = %self.program.display(),
                    "binary not found"
                );
                return VerifyResult::unavailable(
                    VerifyFailure::BinaryNotFound,
                    format!("Binary not found: '{}'.", self.program.display()),
                );
            }
            Err(e) => {
                return VerifyResult::unavailable(
                    VerifyFailure::SpawnFailed,
                    format!("Failed to invoke '{}': {}", self.program.display(), e),
                );
            }
        };

        let (stdout_tail, stdout_handle) = drain(child.stdout.take());
        let (stderr_tail, stderr_handle) = drain(child.stderr.take());
        let deadline = started + self.timeout;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    let detached = join_readers(
                        [stdout_handle, stderr_handle],
                        deadline.max(Instant::now() + READER_GRACE),
                    );
                    if detached > 0 {
                        warn!(
                            program = %self.program.display(),
                            detached,
                            "output pipes still open after exit"
                        );
                    }
                    let duration_ms = started.elapsed().as_millis() as u64;
                    let exit_code = status.code().unwrap_or(-1);
                    let ok = status.success();
                    debug!(
                        program = %self.program.display(),
                        exit_code,
                        duration_ms,
                        "subprocess exited"
                    );
                    return VerifyResult {
                        ok,
                        exit_code,
                        stdout: collect(&stdout_tail, OUTPUT_TAIL_BYTES),
                        stderr: collect(&stderr_tail, OUTPUT_TAIL_BYTES),
                        duration_ms,
                        failure: (!ok).then_some(VerifyFailure::NonZeroExit),
                    };
                }
                Ok(None) if Instant::now() >= deadline => {
                    terminate(&mut child);
                    let duration_ms = started.elapsed().as_millis() as u64;
                    warn!(
                        event = %Event::VerifyTimeout,
                        program = %self.program.display(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "subprocess killed after timeout"
                    );
                    join_readers([stdout_handle, stderr_handle], Instant::now() + READER_GRACE);
                    let mut stderr = collect(&stderr_tail, TIMEOUT_TAIL_BYTES);
                    if !stderr.is_empty() && !stderr.ends_with('\n') {
                        stderr.push('\n');
                    }
                    stderr.push_str(&format!(
                        "Verification timed out after {:.1}s.",
                        self.timeout.as_secs_f64()
                    ));
                    return VerifyResult {
                        ok: false,
                        exit_code: -1,
                        stdout: collect(&stdout_tail, TIMEOUT_TAIL_BYTES),
                        stderr,
                        duration_ms,
                        failure: Some(VerifyFailure::TimedOut),
                    };
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    terminate(&mut child);
                    return VerifyResult {
                        ok: false,
                        exit_code: -1,
                        stdout: collect(&stdout_tail, OUTPUT_TAIL_BYTES),
                        stderr: format!("Failed to wait for '{}': {}", self.program.display(), e),
                        duration_ms: started.elapsed().as_millis() as u64,
                        failure: Some(VerifyFailure::SpawnFailed),
                    };
                }
            }
        }
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_buffer_keeps_last_bytes() {
        let mut buf = TailBuffer::new(4);
        buf.push(b"abc");
        buf.push(b"defg");
        assert_eq!(buf.bytes, b"defg");
    }

    #[test]
    fn test_tail_string_truncates_from_front() {
        assert_eq!(tail_string(b"0123456789", 3), "789");
        assert_eq!(tail_string(b"ab", 10), "ab");
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let result = BoundedCommand::new("/nonexistent/definitely-not-here", Duration::from_secs(1)).run();
        assert!(!result.ok);
        assert_eq!(result.failure, Some(VerifyFailure::BinaryNotFound));
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn test_resolve_binary_absolute_missing() {
        assert!(resolve_binary("/nonexistent/tool").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_success_and_failure_exit_codes() {
        let ok = BoundedCommand::new("true", Duration::from_secs(5)).run();
        assert!(ok.ok);
        assert_eq!(ok.exit_code, 0);
        assert!(ok.failure.is_none());

        let failed = BoundedCommand::new("false", Duration::from_secs(5)).run();
        assert!(!failed.ok);
        assert_eq!(failed.exit_code, 1);
        assert_eq!(failed.failure, Some(VerifyFailure::NonZeroExit));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_is_captured() {
        let result = BoundedCommand::new("sh", Duration::from_secs(5))
            .args(["-c", "echo out; echo err 1>&2"])
            .run();
        assert!(result.ok);
        assert_eq!(result.stdout.trim(), "out");
        assert_eq!(result.stderr.trim(), "err");
    }

    #[cfg(unix)]
    #[test]
    fn test_env_is_passed() {
        let result = BoundedCommand::new("sh", Duration::from_secs(5))
            .args(["-c", "printf %s \"$PROBE\""])
            .env("PROBE", "visible")
            .run();
        assert_eq!(result.stdout, "visible");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_child() {
        let started = Instant::now();
        let result = BoundedCommand::new("sleep", Duration::from_millis(200))
            .arg("10")
            .run();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!result.ok);
        assert_eq!(result.failure, Some(VerifyFailure::TimedOut));
        assert!(result.stderr.contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn test_grandchild_holding_pipes_does_not_block() {
        let started = Instant::now();
        let result = BoundedCommand::new("sh", Duration::from_millis(200))
            .arg("-c")
            .arg("echo started; sleep 10 & sleep 10")
            .run();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(result.failure, Some(VerifyFailure::TimedOut));
        assert!(result.stdout.contains("started"));

        let started = Instant::now();
        let result = BoundedCommand::new("sh", Duration::from_secs(2))
            .arg("-c")
            .arg("sleep 10 & exit 0")
            .run();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(result.ok);
    }
}
