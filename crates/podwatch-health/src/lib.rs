//! podwatch-health — health checking for podwatch targets.
//!
//! Runs one background task per target that periodically executes the
//! target's check, feeds the outcome to a [`HealthTracker`], and publishes
//! the result on a shared [`StatusBoard`] that the status server reads.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── Per-target background task (first tick at t=0, then every interval)
//!   │   ├── execute() → CheckOutcome   (timeout enforced, never errors)
//!   │   └── StatusBoard::record()      (per-target write lock)
//!   │         └── HealthTracker (retries, start-period, bounded history)
//!   └── stop_all(grace): broadcast shutdown, bounded join
//! ```
//!
//! # Health lifecycle
//!
//! Targets start in `Starting`. A single success moves a target to
//! `Healthy` and resets its failure streak. Failures inside the start-period
//! are recorded but never counted; outside it, `retries` consecutive
//! failures mark the target `Unhealthy`.

pub mod board;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod runtime;
pub mod tracker;

pub use board::{ProbeError, StatusBoard, TargetSnapshot};
pub use error::{CheckError, MonitorError, MonitorResult};
pub use executor::{CheckOutcome, execute};
pub use monitor::HealthMonitor;
pub use runtime::Runtime;
pub use tracker::{HealthStatus, HealthTracker};
