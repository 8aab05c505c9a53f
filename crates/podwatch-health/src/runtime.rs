//! Command runtimes for `exec` checks.
//!
//! `Shellout` runs the command on the host. `Testing` simulates a few
//! well-known programs in-process so specs behave the same on any machine.

use std::fmt;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::trace;

use crate::error::CheckError;

/// Upper bound on captured command output.
const MAX_OUTPUT_BYTES: usize = 4096;

/// How `exec` checks are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    /// Spawn the command on the host.
    #[default]
    Shellout,
    /// Simulate `true`, `false`, and `sleep <millis>` without spawning.
    Testing,
}

impl Runtime {
    /// Run `command` (program followed by arguments).
    ///
    /// Returns the captured output on success.
    pub async fn run(self, command: &[String]) -> Result<String, CheckError> {
        let (program, args) = command.split_first().ok_or(CheckError::EmptyCommand)?;
        match self {
            Runtime::Shellout => shellout(program, args).await,
            Runtime::Testing => simulate(program, args).await,
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Runtime::Shellout => f.write_str("shellout"),
            Runtime::Testing => f.write_str("testing"),
        }
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shellout" => Ok(Runtime::Shellout),
            "testing" => Ok(Runtime::Testing),
            other => Err(format!(
                "unknown runtime `{other}` (expected `shellout` or `testing`)"
            )),
        }
    }
}

async fn shellout(program: &str, args: &[String]) -> Result<String, CheckError> {
    // The child is killed if the check future is dropped (timeout, shutdown).
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CheckError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr, status) =
        tokio::try_join!(read_capped(stdout), read_capped(stderr), child.wait()).map_err(
            |source| CheckError::Output {
                program: program.to_string(),
                source,
            },
        )?;

    let captured = capture(&stdout, &stderr);
    trace!(%program, ?status, "command finished");

    if status.success() {
        Ok(captured)
    } else {
        Err(CheckError::ExitStatus {
            program: program.to_string(),
            code: status.code(),
            output: captured,
        })
    }
}

/// Keep the first [`MAX_OUTPUT_BYTES`] of a pipe and discard the rest, so the
/// child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };
    let mut kept = Vec::new();
    (&mut pipe)
        .take(MAX_OUTPUT_BYTES as u64)
        .read_to_end(&mut kept)
        .await?;
    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(kept)
}

async fn simulate(program: &str, args: &[String]) -> Result<String, CheckError> {
    match program {
        "false" => Err(CheckError::Simulated("command `false` failed".to_string())),
        "sleep" => {
            let millis = args
                .first()
                .and_then(|arg| arg.parse::<u64>().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(String::new())
        }
        _ => Ok(String::new()),
    }
}

/// Join stdout and stderr, trimmed and capped at [`MAX_OUTPUT_BYTES`].
fn capture(stdout: &[u8], stderr: &[u8]) -> String {
    let stdout = String::from_utf8_lossy(stdout);
    let stderr = String::from_utf8_lossy(stderr);
    let mut text = match (stdout.trim(), stderr.trim()) {
        ("", err) => err.to_string(),
        (out, "") => out.to_string(),
        (out, err) => format!("{out}\n{err}"),
    };

    if text.len() > MAX_OUTPUT_BYTES {
        let mut end = MAX_OUTPUT_BYTES;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn runtime_from_str() {
        assert_eq!("shellout".parse::<Runtime>(), Ok(Runtime::Shellout));
        assert_eq!("Testing".parse::<Runtime>(), Ok(Runtime::Testing));
        assert!("docker".parse::<Runtime>().is_err());
        assert_eq!(Runtime::Testing.to_string(), "testing");
    }

    #[tokio::test]
    async fn empty_command_fails() {
        let err = Runtime::Testing.run(&[]).await.unwrap_err();
        assert!(matches!(err, CheckError::EmptyCommand));
    }

    #[tokio::test]
    async fn testing_runtime_true_and_false() {
        assert!(Runtime::Testing.run(&cmd(&["true"])).await.is_ok());

        let err = Runtime::Testing.run(&cmd(&["false"])).await.unwrap_err();
        assert_eq!(err.to_string(), "command `false` failed");
    }

    #[tokio::test]
    async fn testing_runtime_sleep_waits() {
        let start = Instant::now();
        Runtime::Testing.run(&cmd(&["sleep", "50"])).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn testing_runtime_unknown_program_succeeds() {
        assert!(Runtime::Testing.run(&cmd(&["whatever", "--flag"])).await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shellout_captures_output() {
        let output = Runtime::Shellout
            .run(&cmd(&["sh", "-c", "echo hello"]))
            .await
            .unwrap();
        assert_eq!(output, "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shellout_nonzero_exit_fails() {
        let err = Runtime::Shellout
            .run(&cmd(&["sh", "-c", "echo nope >&2; exit 3"]))
            .await
            .unwrap_err();
        match err {
            CheckError::ExitStatus { code, output, .. } => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "nope");
            }
            other => panic!("expected ExitStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shellout_missing_program_fails_to_spawn() {
        let err = Runtime::Shellout
            .run(&cmd(&["/definitely/not/a/real/program"]))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shellout_caps_noisy_output() {
        let output = Runtime::Shellout
            .run(&cmd(&["sh", "-c", "yes podwatch | head -c 1000000"]))
            .await
            .unwrap();
        assert_eq!(output.len(), MAX_OUTPUT_BYTES);
        assert!(output.starts_with("podwatch\npodwatch"));
    }

    #[tokio::test]
    async fn read_capped_keeps_prefix_and_drains_rest() {
        let data = vec![b'x'; MAX_OUTPUT_BYTES * 3];
        let kept = read_capped(Some(&data[..])).await.unwrap();
        assert_eq!(kept.len(), MAX_OUTPUT_BYTES);
        assert!(read_capped::<&[u8]>(None).await.unwrap().is_empty());
    }

    #[test]
    fn capture_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_OUTPUT_BYTES);
        let text = capture(long.as_bytes(), b"");
        assert!(text.len() <= MAX_OUTPUT_BYTES);
        assert!(text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn capture_joins_streams() {
        assert_eq!(capture(b"out\n", b"err\n"), "out\nerr");
        assert_eq!(capture(b"", b" err "), "err");
    }
}
