//! Error types for health checking.

use std::time::Duration;

use thiserror::Error;

/// Why a single check failed.
///
/// Never propagated past the executor: it becomes the output of a failed
/// [`CheckOutcome`](crate::CheckOutcome).
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("target is configured to always fail")]
    AlwaysUnhealthy,

    #[error("check timed out after {0:?}")]
    Timeout(Duration),

    #[error("check command is empty")]
    EmptyCommand,

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read output of `{program}`: {source}")]
    Output {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {}{}", exit_code(.code), trailing_output(.output))]
    ExitStatus {
        program: String,
        code: Option<i32>,
        output: String,
    },

    #[error("{0}")]
    Simulated(String),

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("http request to {uri} failed: {reason}")]
    Request { uri: String, reason: String },

    #[error("{uri} returned {status}")]
    BadStatus { uri: String, status: u16 },
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

fn trailing_output(output: &str) -> String {
    if output.is_empty() {
        String::new()
    } else {
        format!(": {output}")
    }
}

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors raised by the scheduler.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("target `{0}` is not on the status board")]
    UnknownTarget(String),

    #[error("health loop for `{target_id}` did not stop within {grace:?}")]
    ShutdownTimeout { target_id: String, grace: Duration },
}
