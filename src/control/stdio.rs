//! Stdout writes for the control plane.
//!
//! - **stdout**: control messages, one JSON object per line
//! - **stderr**: logs (never parsed by the supervisor)

use std::io::{self, Write};

use serde::Serialize;

use crate::error::Result;

/// Write `line` plus a single `\n` to `out` and flush.
///
/// Uses an explicit `\n` rather than `writeln!` so the terminator never varies
/// by platform.
pub(crate) fn write_line<W: Write>(out: &mut W, line: &str) -> io::Result<()> {
    out.write_all(line.as_bytes())?;
    out.write_all(b"\n")?;
    out.flush()
}

/// Write a line to stdout and flush it immediately.
///
/// The supervisor blocks until it sees a complete line, so logging must never
/// go through this path.
pub fn write_stdout_line(line: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_line(&mut handle, line)
}

/// Serialize `value` as compact JSON and write it to stdout as one line.
pub fn write_stdout_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    write_stdout_line(&json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_line_terminates_with_lf() {
        let mut out = Vec::new();
        write_line(&mut out, r#"{"event":"ready"}"#).unwrap();
        assert_eq!(out, b"{\"event\":\"ready\"}\n");
    }

    #[test]
    fn test_write_stdout_json() {
        #[derive(Serialize)]
        struct Status {
            ok: bool,
        }
        assert!(write_stdout_json(&Status { ok: true }).is_ok());
    }
}
