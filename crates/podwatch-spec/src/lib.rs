//! podwatch-spec — the declarative document a controller is started with.
//!
//! A spec lists the monitored targets, each with a check definition and the
//! timing/threshold parameters that drive its health lifecycle. Documents are
//! JSON or TOML; both deserialize into [`SpecDocument`], which is validated
//! into an immutable [`Spec`].
//!
//! ```text
//! load(path)
//!   ├── read file            → SpecError::NotFound
//!   ├── parse JSON / TOML    → SpecError::Malformed
//!   └── SpecDocument::validate
//!         ├── parse durations, check thresholds → SpecError::InvalidField
//!         └── Spec { targets: Vec<TargetConfig> }
//! ```

pub mod duration;
pub mod error;
pub mod loader;
pub mod types;

pub use duration::parse_duration;
pub use error::{SpecError, SpecResult};
pub use loader::{SpecFormat, load, parse};
pub use types::*;
