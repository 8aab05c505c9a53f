//! Spec document types.
//!
//! [`SpecDocument`] mirrors the on-disk format (durations as strings,
//! optional fields defaulted by serde). [`SpecDocument::validate`] turns it
//! into a [`Spec`] whose [`TargetConfig`]s hold parsed values only.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{SpecError, SpecResult};

// ── On-disk document ───────────────────────────────────────────────

/// A spec document as written by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SpecDocument {
    pub targets: Vec<TargetDocument>,
}

/// A single target as written by the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TargetDocument {
    pub id: String,
    /// Check to run; an omitted check always succeeds.
    #[serde(default)]
    pub check: CheckDefinition,
    /// Time between checks (e.g., "5s").
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Maximum time for one check (e.g., "1s").
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Consecutive failures before marking unhealthy.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Grace window during which failures do not count (e.g., "30s").
    #[serde(default = "default_start_period")]
    pub start_period: String,
    /// Number of outcomes retained per target.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_interval() -> String {
    "5s".to_string()
}

fn default_timeout() -> String {
    "1s".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_start_period() -> String {
    "0s".to_string()
}

fn default_history_limit() -> usize {
    3
}

/// What a check does. The set of kinds is closed; `kind` selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckDefinition {
    /// Always succeeds.
    #[default]
    Healthy,
    /// Always fails.
    Unhealthy,
    /// Runs a command; exit code 0 is a success.
    Exec { command: Vec<String> },
    /// Sends `GET http://{host}:{port}{path}` and matches the status code.
    Http {
        host: String,
        port: u16,
        #[serde(default = "default_http_path")]
        path: String,
        #[serde(default = "default_success_codes")]
        success_codes: Vec<u16>,
    },
}

fn default_http_path() -> String {
    "/".to_string()
}

fn default_success_codes() -> Vec<u16> {
    vec![200]
}

impl CheckDefinition {
    /// Short name of the check kind, as written in documents.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckDefinition::Healthy => "healthy",
            CheckDefinition::Unhealthy => "unhealthy",
            CheckDefinition::Exec { .. } => "exec",
            CheckDefinition::Http { .. } => "http",
        }
    }

    fn validate(&self, target: &str) -> SpecResult<()> {
        match self {
            CheckDefinition::Healthy | CheckDefinition::Unhealthy => Ok(()),
            CheckDefinition::Exec { command } => match command.first() {
                Some(program) if !program.trim().is_empty() => Ok(()),
                _ => Err(SpecError::invalid(target, "check.command", "command must name a program")),
            },
            CheckDefinition::Http {
                host,
                path,
                success_codes,
                ..
            } => {
                if host.trim().is_empty() {
                    return Err(SpecError::invalid(target, "check.host", "host must not be empty"));
                }
                if !path.starts_with('/') {
                    return Err(SpecError::invalid(target, "check.path", "path must start with '/'"));
                }
                if success_codes.is_empty() {
                    return Err(SpecError::invalid(
                        target,
                        "check.success_codes",
                        "at least one success code is required",
                    ));
                }
                if let Some(code) = success_codes.iter().find(|c| !(100..=599).contains(*c)) {
                    return Err(SpecError::invalid(
                        target,
                        "check.success_codes",
                        format!("{code} is not an HTTP status code"),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ── Validated spec ────────────────────────────────────────────────

/// A validated spec. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Spec {
    pub targets: Vec<TargetConfig>,
}

impl Spec {
    /// Look up a target by id.
    pub fn target(&self, id: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.id == id)
    }
}

/// A validated target configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetConfig {
    pub id: String,
    pub check: CheckDefinition,
    pub interval: Duration,
    pub timeout: Duration,
    pub retries: u32,
    pub start_period: Duration,
    pub history_limit: usize,
}

impl TargetConfig {
    /// A target with default timing, for building specs in code.
    pub fn new(id: impl Into<String>, check: CheckDefinition) -> Self {
        Self {
            id: id.into(),
            check,
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(1),
            retries: default_retries(),
            start_period: Duration::ZERO,
            history_limit: default_history_limit(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_start_period(mut self, start_period: Duration) -> Self {
        self.start_period = start_period;
        self
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }
}

impl SpecDocument {
    /// Validate every target and produce an immutable [`Spec`].
    pub fn validate(self) -> SpecResult<Spec> {
        if self.targets.is_empty() {
            return Err(SpecError::Malformed("spec declares no targets".to_string()));
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(self.targets.len());
        for doc in self.targets {
            let target = doc.validate()?;
            if !seen.insert(target.id.clone()) {
                return Err(SpecError::invalid(&target.id, "id", "duplicate target id"));
            }
            targets.push(target);
        }

        Ok(Spec { targets })
    }
}

impl TargetDocument {
    fn validate(self) -> SpecResult<TargetConfig> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(SpecError::invalid(&self.id, "id", "target id must not be empty"));
        }

        let interval = duration_field(id, "interval", &self.interval)?;
        if interval.is_zero() {
            return Err(SpecError::invalid(id, "interval", "must be greater than zero"));
        }
        let timeout = duration_field(id, "timeout", &self.timeout)?;
        if timeout.is_zero() {
            return Err(SpecError::invalid(id, "timeout", "must be greater than zero"));
        }
        let start_period = duration_field(id, "start_period", &self.start_period)?;

        if self.retries < 1 {
            return Err(SpecError::invalid(id, "retries", "must be at least 1"));
        }
        if self.history_limit < 1 {
            return Err(SpecError::invalid(id, "history_limit", "must be at least 1"));
        }
        self.check.validate(id)?;

        Ok(TargetConfig {
            id: id.to_string(),
            check: self.check,
            interval,
            timeout,
            retries: self.retries,
            start_period,
            history_limit: self.history_limit,
        })
    }
}

fn duration_field(target: &str, field: &'static str, value: &str) -> SpecResult<Duration> {
    parse_duration(value)
        .ok_or_else(|| SpecError::invalid(target, field, format!("`{value}` is not a duration")))
}
