//! podwatchd — the podwatch controller daemon.
//!
//! Single binary that assembles:
//! - Spec loader (targets and their checks)
//! - Health monitor (one check loop per target)
//! - Status server (`/`, `/healthy`, `/status`, `/kill`)
//!
//! # Usage
//!
//! ```text
//! podwatchd --spec tests/specs/healthy_forever.json --port 8888 --runtime shellout
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use podwatch_health::{HealthMonitor, Runtime, StatusBoard};
use podwatch_spec::Spec;

#[derive(Debug, Parser)]
#[command(name = "podwatchd", about = "podwatch health-check controller", version)]
pub struct Cli {
    /// Path to the spec document (JSON or TOML).
    #[arg(long)]
    pub spec: PathBuf,

    /// How exec checks are run: shellout or testing.
    #[arg(long, default_value = "shellout")]
    pub runtime: Runtime,

    /// Port the status server listens on.
    #[arg(long, default_value = "8888")]
    pub port: u16,

    /// How long each check loop gets to stop on shutdown, in milliseconds.
    #[arg(long, default_value = "2000")]
    pub shutdown_grace_ms: u64,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Load the spec, bind the status server, and run until killed.
///
/// Any error here means the controller never started.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("podwatch controller starting");

    // ── Load spec ──────────────────────────────────────────────

    let spec = podwatch_spec::load(&cli.spec)
        .with_context(|| format!("failed to load spec {}", cli.spec.display()))?;
    info!(path = ?cli.spec, targets = spec.targets.len(), "spec loaded");

    // ── Bind status server ─────────────────────────────────────

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to listen on {addr}"))?;

    serve(spec, listener, cli.runtime, cli.shutdown_grace()).await
}

/// Run the check loops and the status server on `listener` until `/kill`
/// or an interrupt, then stop every loop within `grace`.
pub async fn serve(
    spec: Spec,
    listener: TcpListener,
    runtime: Runtime,
    grace: Duration,
) -> anyhow::Result<()> {
    // ── Initialize subsystems ──────────────────────────────────

    let board = StatusBoard::new(&spec.targets);
    let monitor = HealthMonitor::new(board.clone(), runtime);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let router = podwatch_api::build_router(board, shutdown_tx.clone());
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "status server listening");
    }

    // ── Start check loops ──────────────────────────────────────

    monitor.start_all(&spec).await?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx, shutdown_rx))
        .await?;

    // ── Stop check loops ───────────────────────────────────────

    let overrun = monitor.stop_all(grace).await;
    if !overrun.is_empty() {
        warn!(loops = overrun.len(), ?grace, "some health loops were aborted");
    }

    info!("podwatch controller stopped");
    Ok(())
}

/// Resolves once `/kill` is called or the process is interrupted.
async fn shutdown_signal(tx: Arc<watch::Sender<bool>>, mut rx: watch::Receiver<bool>) {
    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received"),
            Err(e) => {
                warn!(error = %e, "failed to install interrupt handler");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = rx.wait_for(|killing| *killing) => info!("kill requested"),
        _ = interrupted => {
            tx.send_replace(true);
        }
    }
    info!("shutdown signal received");
}
