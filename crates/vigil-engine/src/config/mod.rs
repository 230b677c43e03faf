//! Engine config: strict YAML, validated before anything is registered.

pub mod schema;

use std::fs;
use std::path::Path;

use vigil_core::error::{Result, VigilError};

pub use schema::{DefaultDecision, EngineConfig, EngineSection, ExtensionConfig};

/// Read and validate a config file. An unreadable file is a bad request
/// naming the path, not an engine failure.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        VigilError::BadRequest(format!("cannot read config {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "config loaded");
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<EngineConfig> {
    let cfg: EngineConfig = serde_yaml::from_str(s)
        .map_err(|e| VigilError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
