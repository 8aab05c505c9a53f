//! Per-target health state machine.
//!
//! Consumes check outcomes, applies the retry and start-period policy, and
//! keeps a bounded history of the most recent outcomes.

use std::collections::VecDeque;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

use podwatch_spec::TargetConfig;

use crate::executor::CheckOutcome;

/// Health of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No success yet, and not enough counted failures to give up.
    Starting,
    /// The most recent success has not been followed by `retries` failures.
    Healthy,
    /// `retries` consecutive failures outside the start-period.
    Unhealthy,
}

/// Tracks consecutive outcomes and history for a single target.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    status: HealthStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    /// Total outcomes recorded.
    checks: u64,
    /// Most recent outcomes, oldest first.
    history: VecDeque<CheckOutcome>,
    /// Most recent failed outcome, kept even after it leaves `history`.
    latest_failure: Option<CheckOutcome>,
    retries: u32,
    history_limit: usize,
    /// Checks started before this instant are in the start-period. `None`
    /// when the start-period outlasts the clock.
    start_period_ends_at: Option<Instant>,
}

impl HealthTracker {
    /// Create a tracker for `config`, whose start-period begins at
    /// `started_at`.
    pub fn new(config: &TargetConfig, started_at: Instant) -> Self {
        Self::with_thresholds(
            config.retries,
            config.history_limit,
            config.start_period,
            started_at,
        )
    }

    /// Create a tracker with explicit thresholds.
    pub fn with_thresholds(
        retries: u32,
        history_limit: usize,
        start_period: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            status: HealthStatus::Starting,
            consecutive_failures: 0,
            consecutive_successes: 0,
            checks: 0,
            // Grows on demand; `history_limit` is user-supplied and unbounded.
            history: VecDeque::new(),
            latest_failure: None,
            retries: retries.max(1),
            history_limit: history_limit.max(1),
            start_period_ends_at: started_at.checked_add(start_period),
        }
    }

    /// Record an outcome and return the new health status.
    pub fn record(&mut self, outcome: CheckOutcome) -> HealthStatus {
        self.checks = self.checks.saturating_add(1);

        if outcome.success {
            self.consecutive_failures = 0;
            self.consecutive_successes = self.consecutive_successes.saturating_add(1);
            if self.status != HealthStatus::Healthy {
                debug!(
                    previous = ?self.status,
                    checks = self.checks,
                    "target became healthy"
                );
            }
            self.status = HealthStatus::Healthy;
        } else {
            self.latest_failure = Some(outcome.clone());

            if self.in_start_period(outcome.started) {
                debug!(status = ?self.status, "failure ignored during start period");
            } else {
                self.consecutive_successes = 0;
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);

                if self.consecutive_failures >= self.retries {
                    if self.status != HealthStatus::Unhealthy {
                        warn!(
                            failures = self.consecutive_failures,
                            retries = self.retries,
                            "target marked unhealthy"
                        );
                    }
                    self.status = HealthStatus::Unhealthy;
                }
            }
        }

        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(outcome);

        self.status
    }

    /// Whether a check started at `started` falls in the start-period.
    pub fn in_start_period(&self, started: Instant) -> bool {
        self.start_period_ends_at.is_none_or(|end| started < end)
    }

    /// Current health status.
    pub fn status(&self) -> HealthStatus {
        self.status
    }

    /// Whether this target counts towards aggregate health.
    ///
    /// A target still starting counts as healthy until a failure is counted
    /// against it, so a controller is not reported unhealthy before its
    /// first checks complete.
    pub fn counts_as_healthy(&self) -> bool {
        match self.status {
            HealthStatus::Healthy => true,
            HealthStatus::Starting => self.consecutive_failures == 0,
            HealthStatus::Unhealthy => false,
        }
    }

    /// Current number of consecutive counted failures.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Current number of consecutive successes.
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    /// Total outcomes recorded.
    pub fn checks(&self) -> u64 {
        self.checks
    }

    /// Retained outcomes, oldest first.
    pub fn history(&self) -> &VecDeque<CheckOutcome> {
        &self.history
    }

    /// Most recent failed outcome, if any.
    pub fn latest_failure(&self) -> Option<&CheckOutcome> {
        self.latest_failure.as_ref()
    }
}
