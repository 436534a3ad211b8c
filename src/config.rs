// src/config.rs

//! Configuration file for an analysis run.
//!
//! ```toml
//! repository = "https://svn.example.org/repos/main"
//! jobs = 4
//! components = ["core", "tools"]
//!
//! [layout]
//! trunk = "trunk"
//! branches = "branches"
//! tags = "tags"
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of workers, and therefore of in-flight repository queries
pub const DEFAULT_JOBS: usize = 4;

/// Directory names that separate trunk, branches and tags inside a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub trunk: String,
    pub branches: String,
    pub tags: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            trunk: "trunk".to_string(),
            branches: "branches".to_string(),
            tags: "tags".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository root URL
    pub repository: Option<String>,
    pub jobs: usize,
    /// Component directories at the repository root; empty means the root itself is the component
    pub components: Vec<String>,
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repository: None,
            jobs: DEFAULT_JOBS,
            components: Vec::new(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs == 0 {
            return Err(ConfigError::Invalid("jobs must be at least 1".to_string()));
        }
        for (field, name) in [
            ("trunk", &self.layout.trunk),
            ("branches", &self.layout.branches),
            ("tags", &self.layout.tags),
        ] {
            if name.is_empty() || name.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "layout.{field} must be a single directory name, got '{name}'"
                )));
            }
        }
        Ok(())
    }
}
