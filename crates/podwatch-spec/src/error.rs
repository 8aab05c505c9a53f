//! Error types for spec loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for spec operations.
pub type SpecResult<T> = Result<T, SpecError>;

/// Errors that can occur while loading a spec document.
///
/// All of them are fatal: the controller refuses to start on a bad spec.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The document could not be read (missing or unreadable).
    #[error("spec not found at {}: {source}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed JSON/TOML or does not match the schema.
    #[error("malformed spec: {0}")]
    Malformed(String),

    /// A field parsed but violates an invariant.
    #[error("invalid field `{field}` on target `{target}`: {reason}")]
    InvalidField {
        target: String,
        field: &'static str,
        reason: String,
    },
}

impl SpecError {
    pub(crate) fn invalid(target: &str, field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            target: target.to_string(),
            field,
            reason: reason.into(),
        }
    }
}
