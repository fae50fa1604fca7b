//! Engine configuration.
//!
//! Every setting has a default, so an empty document is a valid config.
//!
//! # Example
//!
//! ```toml
//! max_generations = 4
//! max_created_messages = 256
//! max_route_iterations = 8
//! memoize_pure_functions = true
//!
//! [compiler]
//! enabled = true
//! threshold = 16
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum spawn depth: messages created by a message at this depth are
    /// discarded.
    pub max_generations: usize,
    /// Maximum number of created messages per evaluation request.
    pub max_created_messages: usize,
    /// Maximum number of re-resolution passes after a message is routed to
    /// additional streams.
    pub max_route_iterations: usize,
    pub memoize_pure_functions: bool,
    pub compiler: CompilerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_generations: 8,
            max_created_messages: 1024,
            max_route_iterations: 8,
            memoize_pure_functions: true,
            compiler: CompilerConfig::default(),
        }
    }
}

/// `[compiler]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    pub enabled: bool,
    /// Executions after which a rule is compiled. 0 compiles at load time.
    pub threshold: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            enabled: true,
            threshold: 16,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse engine config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML config file from `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
