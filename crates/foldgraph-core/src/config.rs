use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::compactor::DEFAULT_BLOCK_SIZE;

/// Tuning knobs for the engine, loadable from TOML.
///
/// ```toml
/// block_size = 30
/// max_walk = 500
/// short_fragment_max_size = 10
/// max_linear_steps = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Block width of the index compactor.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Step budget for fragment walks and for growing a synthesis range.
    #[serde(default = "default_max_walk")]
    pub max_walk: usize,
    /// Largest short fragment the linear fragment search will close.
    #[serde(default = "default_short_fragment_max_size")]
    pub short_fragment_max_size: usize,
    /// How many short fragments a maximal linear fragment may chain.
    #[serde(default = "default_max_linear_steps")]
    pub max_linear_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            max_walk: default_max_walk(),
            short_fragment_max_size: default_short_fragment_max_size(),
            max_linear_steps: default_max_linear_steps(),
        }
    }
}

/// Load an [`EngineConfig`] from a TOML file. A missing file yields the
/// defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<EngineConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

const fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

const fn default_max_walk() -> usize {
    500
}

const fn default_short_fragment_max_size() -> usize {
    10
}

const fn default_max_linear_steps() -> usize {
    10
}
