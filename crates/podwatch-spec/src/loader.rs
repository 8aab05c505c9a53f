//! Spec document loading.

use std::path::Path;

use crate::error::{SpecError, SpecResult};
use crate::types::{Spec, SpecDocument};

/// Serialization format of a spec document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Toml,
}

impl SpecFormat {
    /// Pick a format from the file extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(SpecFormat::Json),
            "toml" => Some(SpecFormat::Toml),
            _ => None,
        }
    }
}

/// Read and validate the spec document at `path`.
pub fn load(path: impl AsRef<Path>) -> SpecResult<Spec> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| SpecError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, SpecFormat::from_path(path))
}

/// Parse and validate a spec document.
///
/// Without a known format, JSON is tried first and TOML second; the error
/// then carries both parser messages.
pub fn parse(content: &str, format: Option<SpecFormat>) -> SpecResult<Spec> {
    let document: SpecDocument = match format {
        Some(SpecFormat::Json) => serde_json::from_str(content)
            .map_err(|e| SpecError::Malformed(format!("{e} (json)")))?,
        Some(SpecFormat::Toml) => {
            toml::from_str(content).map_err(|e| SpecError::Malformed(format!("{e} (toml)")))?
        }
        None => match serde_json::from_str(content) {
            Ok(document) => document,
            Err(json_err) => toml::from_str(content).map_err(|toml_err| {
                SpecError::Malformed(format!("{json_err} (json) | {toml_err} (toml)"))
            })?,
        },
    };
    document.validate()
}
