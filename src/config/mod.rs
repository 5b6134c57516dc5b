pub mod types;

use std::path::Path;

use crate::error::{RateShopperError, Result};
use types::Config;

pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        RateShopperError::Configuration(format!(
            "failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    // An empty file deserializes to null, which serde_yml rejects for a struct
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config = serde_yml::from_str(&content)?;
    config.engine.validate()?;
    Ok(config)
}
