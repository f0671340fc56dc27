//! Config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use stagemeter_core::error::{Result, StagemeterError};

pub use schema::{MetricsSection, ServerSection, StagemeterConfig};

pub fn load_from_file(path: impl AsRef<Path>) -> Result<StagemeterConfig> {
    let path = path.as_ref();
    let s = fs::read_to_string(path).map_err(|e| {
        StagemeterError::Internal(format!("read config {} failed: {e}", path.display()))
    })?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<StagemeterConfig> {
    let cfg: StagemeterConfig = serde_yaml::from_str(s)
        .map_err(|e| StagemeterError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
