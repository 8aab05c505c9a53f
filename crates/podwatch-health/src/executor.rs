//! Check execution.
//!
//! [`execute`] runs one check for one target and always returns a
//! [`CheckOutcome`]. Failures of any kind, including timeouts, become a
//! failed outcome carrying the error text.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use podwatch_spec::CheckDefinition;

use crate::error::CheckError;
use crate::runtime::Runtime;

/// The recorded result of one check execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CheckOutcome {
    /// Unix timestamp (milliseconds) when the check started.
    pub timestamp: u64,
    pub success: bool,
    /// Captured output on success, error text on failure.
    pub output: String,
    pub duration_ms: u64,
    /// Monotonic start of the check; drives the start-period.
    #[serde(skip)]
    pub started: Instant,
}

impl CheckOutcome {
    pub fn passed(timestamp: u64, duration: Duration, output: impl Into<String>) -> Self {
        Self {
            timestamp,
            success: true,
            output: output.into(),
            duration_ms: millis(duration),
            started: Instant::now(),
        }
    }

    pub fn failed(timestamp: u64, duration: Duration, output: impl Into<String>) -> Self {
        Self {
            timestamp,
            success: false,
            output: output.into(),
            duration_ms: millis(duration),
            started: Instant::now(),
        }
    }

    /// Override the monotonic start of the check.
    pub fn with_started(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }
}

/// Run `check` once, giving up after `timeout`.
///
/// The in-flight probe is dropped on timeout; `exec` children are killed.
pub async fn execute(check: &CheckDefinition, timeout: Duration, runtime: Runtime) -> CheckOutcome {
    let timestamp = epoch_millis();
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, run_check(check, runtime)).await {
        Ok(result) => result,
        Err(_) => Err(CheckError::Timeout(timeout)),
    };
    let elapsed = started.elapsed();

    let outcome = match result {
        Ok(output) => CheckOutcome::passed(timestamp, elapsed, output),
        Err(e) => {
            debug!(kind = check.kind(), error = %e, "check failed");
            CheckOutcome::failed(timestamp, elapsed, e.to_string())
        }
    };
    outcome.with_started(started)
}

async fn run_check(check: &CheckDefinition, runtime: Runtime) -> Result<String, CheckError> {
    match check {
        CheckDefinition::Healthy => Ok(String::new()),
        CheckDefinition::Unhealthy => Err(CheckError::AlwaysUnhealthy),
        CheckDefinition::Exec { command } => runtime.run(command).await,
        CheckDefinition::Http {
            host,
            port,
            path,
            success_codes,
        } => http_probe(&format!("{host}:{port}"), path, success_codes).await,
    }
}

/// Perform an HTTP GET against `address` + `path`.
///
/// Succeeds if the response status is one of `success_codes`.
pub async fn http_probe(
    address: &str,
    path: &str,
    success_codes: &[u16],
) -> Result<String, CheckError> {
    let uri = format!("http://{address}{path}");

    let stream = tokio::net::TcpStream::connect(address)
        .await
        .map_err(|e| CheckError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| CheckError::Connect {
            address: address.to_string(),
            reason: format!("handshake failed: {e}"),
        })?;

    // Drive the connection in the background; it ends once `sender` drops.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = http::Request::builder()
        .method("GET")
        .uri(&uri)
        .header("host", address)
        .header("user-agent", "podwatch/0.1")
        .body(http_body_util::Empty::<bytes::Bytes>::new())
        .map_err(|e| CheckError::Request {
            uri: uri.clone(),
            reason: e.to_string(),
        })?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| CheckError::Request {
            uri: uri.clone(),
            reason: e.to_string(),
        })?;

    let status = resp.status().as_u16();
    if success_codes.contains(&status) {
        Ok(format!("HTTP {status}"))
    } else {
        Err(CheckError::BadStatus { uri, status })
    }
}

fn epoch_millis() -> u64 {
    millis(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
