//! JSON-lines I/O for the CLI
//!
//! - Input: one JSON request per line
//! - Output: one JSON object per line
//! - UTF-8 only

use std::io::{BufRead, Write};

use serde_json::Value;

use crate::api::ApiHandler;

use super::errors::CliResult;

/// Answers every non-blank line of `input` on `output`, one response per
/// line. Returns the number of requests handled.
pub fn serve_lines<R, W>(handler: &ApiHandler<'_>, input: R, output: &mut W) -> CliResult<usize>
where
    R: BufRead,
    W: Write,
{
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handler.handle(&line);
        writeln!(output, "{}", response.to_json())?;
        output.flush()?;
        handled += 1;
    }
    Ok(handled)
}

/// Write a success envelope
pub fn write_response<W: Write>(output: &mut W, data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    serde_json::to_writer(&mut *output, &response)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

/// Write an error envelope
pub fn write_error<W: Write>(output: &mut W, code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    serde_json::to_writer(&mut *output, &response)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;
    use crate::kernel::Kernel;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_serve_lines_skips_blank_lines() {
        let root = TempDir::new().unwrap();
        let kernel = Kernel::new(KernelConfig {
            artifact_dir: root.path().to_path_buf(),
            ..KernelConfig::default()
        })
        .unwrap();
        let handler = ApiHandler::new(&kernel);

        let input = "{\"op\":\"get_verification_status\",\"session\":\"s\"}\n\n{bad json\n";
        let mut output = Vec::new();
        let handled = serve_lines(&handler, Cursor::new(input), &mut output).unwrap();
        assert_eq!(handled, 2);

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["status"], "ok");
        assert_eq!(lines[0]["data"]["status"], "unverified");
        assert_eq!(lines[1]["code"], "KERNEL_INVALID_REQUEST");
    }

    #[test]
    fn test_write_error_envelope() {
        let mut output = Vec::new();
        write_error(&mut output, "KERNEL_CLI_IO_ERROR", "boom").unwrap();
        let value: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "boom");
    }
}
