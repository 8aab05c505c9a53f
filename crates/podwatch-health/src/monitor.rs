//! Health monitor — background task per target that runs its checks.
//!
//! The `HealthMonitor` spawns one loop per target. Each loop fires
//! immediately, then every `interval`, and publishes outcomes on the
//! [`StatusBoard`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use podwatch_spec::{Spec, TargetConfig};

use crate::board::StatusBoard;
use crate::error::{MonitorError, MonitorResult};
use crate::executor::execute;
use crate::runtime::Runtime;

/// Per-target monitor state.
struct MonitorSlot {
    /// Handle to the background check task.
    handle: JoinHandle<()>,
    /// Shutdown signal for this monitor.
    shutdown_tx: watch::Sender<bool>,
}

/// Manages the check loops for all targets on a board.
pub struct HealthMonitor {
    board: StatusBoard,
    runtime: Runtime,
    /// Active monitors: target_id → slot.
    monitors: Arc<RwLock<HashMap<String, MonitorSlot>>>,
}

impl HealthMonitor {
    /// Create a new health monitor publishing to `board`.
    pub fn new(board: StatusBoard, runtime: Runtime) -> Self {
        Self {
            board,
            runtime,
            monitors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a loop for every target in `spec`.
    pub async fn start_all(&self, spec: &Spec) -> MonitorResult<()> {
        for target in &spec.targets {
            self.start_monitor(target).await?;
        }
        info!(targets = spec.targets.len(), runtime = %self.runtime, "health monitors started");
        Ok(())
    }

    /// Spawn the loop for one target. The target must have a slot on the board.
    async fn start_monitor(&self, target: &TargetConfig) -> MonitorResult<()> {
        if !self.board.contains(&target.id) {
            return Err(MonitorError::UnknownTarget(target.id.clone()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_health_loop(
            target.clone(),
            self.board.clone(),
            self.runtime,
            shutdown_rx,
        ));
        self.monitors.write().await.insert(
            target.id.clone(),
            MonitorSlot {
                handle,
                shutdown_tx,
            },
        );

        debug!(
            target_id = %target.id,
            kind = target.check.kind(),
            interval = ?target.interval,
            "health monitor started"
        );
        Ok(())
    }

    /// Stop all monitors (for graceful shutdown).
    ///
    /// Every loop is signalled first, then each is given `grace` to exit.
    /// Loops that overrun are aborted and reported as `ShutdownTimeout`.
    pub async fn stop_all(&self, grace: Duration) -> Vec<MonitorError> {
        let slots: Vec<(String, MonitorSlot)> = self.monitors.write().await.drain().collect();

        for (_, slot) in &slots {
            let _ = slot.shutdown_tx.send(true);
        }

        let mut overrun = Vec::new();
        for (target_id, slot) in slots {
            let abort = slot.handle.abort_handle();
            match tokio::time::timeout(grace, slot.handle).await {
                Ok(_) => debug!(%target_id, "health monitor stopped"),
                Err(_) => {
                    abort.abort();
                    let err = MonitorError::ShutdownTimeout { target_id, grace };
                    warn!(error = %err, "aborting health loop");
                    overrun.push(err);
                }
            }
        }

        info!("all health monitors stopped");
        overrun
    }
}

/// The check loop for a single target.
async fn run_health_loop(
    target: TargetConfig,
    board: StatusBoard,
    runtime: Runtime,
    mut shutdown: watch::Receiver<bool>,
) {
    // First tick completes immediately.
    let mut ticker = tokio::time::interval(target.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(target_id = %target.id, "health loop starting");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let outcome = tokio::select! {
            outcome = execute(&target.check, target.timeout, runtime) => outcome,
            _ = shutdown.changed() => {
                debug!(target_id = %target.id, "abandoning in-flight check");
                break;
            }
        };

        let success = outcome.success;
        if let Some((previous, current)) = board.record(&target.id, outcome).await {
            if previous != current {
                info!(target_id = %target.id, ?previous, ?current, "target health changed");
            } else {
                debug!(target_id = %target.id, success, status = ?current, "check recorded");
            }
        }
    }

    debug!(target_id = %target.id, "health loop shutting down");
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::board::TargetSnapshot;
    use crate::tracker::HealthStatus;
    use podwatch_spec::CheckDefinition;

    fn fast_target(id: &str, check: CheckDefinition) -> TargetConfig {
        TargetConfig::new(id, check)
            .with_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_millis(200))
            .with_retries(3)
            .with_history_limit(3)
    }

    fn spec(targets: Vec<TargetConfig>) -> Spec {
        Spec { targets }
    }

    /// Poll a target's snapshot until `check` holds or two seconds pass.
    async fn wait_for(
        board: &StatusBoard,
        target_id: &str,
        check: impl Fn(&TargetSnapshot) -> bool,
    ) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if board.target(target_id).await.is_some_and(|s| check(&s)) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn monitor_starts_and_stops() {
        let spec = spec(vec![fast_target("web", CheckDefinition::Healthy)]);
        let board = StatusBoard::new(&spec.targets);
        let monitor = HealthMonitor::new(board.clone(), Runtime::Testing);

        monitor.start_all(&spec).await.unwrap();
        assert!(wait_for(&board, "web", |s| s.checks > 0).await);

        assert!(monitor.stop_all(Duration::from_secs(1)).await.is_empty());
        let checks = board.target("web").await.unwrap().checks;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(board.target("web").await.unwrap().checks, checks);
    }

    #[tokio::test]
    async fn monitor_rejects_target_missing_from_board() {
        let board = StatusBoard::new(&[]);
        let monitor = HealthMonitor::new(board, Runtime::Testing);

        let err = monitor
            .start_all(&spec(vec![fast_target("ghost", CheckDefinition::Healthy)]))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::UnknownTarget(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn first_check_fires_immediately() {
        let target = fast_target("web", CheckDefinition::Healthy).with_interval(Duration::from_secs(3600));
        let spec = spec(vec![target]);
        let board = StatusBoard::new(&spec.targets);
        let monitor = HealthMonitor::new(board.clone(), Runtime::Testing);
        monitor.start_all(&spec).await.unwrap();

        assert!(wait_for(&board, "web", |s| s.status == HealthStatus::Healthy).await);
        monitor.stop_all(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn unhealthy_target_converges_with_capped_history() {
        let spec = spec(vec![fast_target("db", CheckDefinition::Unhealthy)]);
        let board = StatusBoard::new(&spec.targets);
        let monitor = HealthMonitor::new(board.clone(), Runtime::Testing);
        monitor.start_all(&spec).await.unwrap();

        assert!(
            wait_for(&board, "db", |s| {
                s.checks > 5 && s.status == HealthStatus::Unhealthy
            })
            .await
        );

        let snapshot = board.target("db").await.unwrap();
        assert_eq!(snapshot.states.len(), 3);
        assert!(!board.healthy().await);

        assert!(monitor.stop_all(Duration::from_secs(1)).await.is_empty());
    }

    #[tokio::test]
    async fn mixed_targets_report_unhealthy_aggregate() {
        let spec = spec(vec![
            fast_target("web", CheckDefinition::Healthy),
            fast_target("db", CheckDefinition::Unhealthy),
        ]);
        let board = StatusBoard::new(&spec.targets);
        let monitor = HealthMonitor::new(board.clone(), Runtime::Testing);
        monitor.start_all(&spec).await.unwrap();

        assert!(wait_for(&board, "db", |s| s.status == HealthStatus::Unhealthy).await);
        assert_eq!(
            board.target("web").await.map(|s| s.status),
            Some(HealthStatus::Healthy)
        );
        assert!(!board.healthy().await);

        monitor.stop_all(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn stop_all_abandons_in_flight_checks() {
        let target = fast_target(
            "slow",
            CheckDefinition::Exec {
                command: vec!["sleep".to_string(), "60000".to_string()],
            },
        )
        .with_timeout(Duration::from_secs(120));
        let spec = spec(vec![target]);
        let board = StatusBoard::new(&spec.targets);
        let monitor = HealthMonitor::new(board.clone(), Runtime::Testing);
        monitor.start_all(&spec).await.unwrap();

        // Let the first check get under way.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let overrun = monitor.stop_all(Duration::from_secs(1)).await;
        assert!(overrun.is_empty());
        assert!(started.elapsed() < Duration::from_secs(1));

        // The abandoned check never landed on the board.
        assert_eq!(board.target("slow").await.unwrap().checks, 0);
    }

    #[tokio::test]
    async fn stop_all_twice_is_a_no_op() {
        let spec = spec(vec![fast_target("web", CheckDefinition::Healthy)]);
        let board = StatusBoard::new(&spec.targets);
        let monitor = HealthMonitor::new(board, Runtime::Testing);
        monitor.start_all(&spec).await.unwrap();

        assert!(monitor.stop_all(Duration::from_secs(1)).await.is_empty());
        assert!(monitor.stop_all(Duration::from_secs(1)).await.is_empty());
    }
}
