//! Configuration management for semantic-protocol
//!
//! Reads `~/.semantic-protocol/config.toml` (or an explicit path). The file is
//! optional; every section falls back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{CHILDREN, DEPENDENCIES, PARENT, VALIDATORS};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub relationships: RelationshipConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum confidence (0-100) for a best match
    pub threshold: u8,
    /// Memoized analyses to keep; 0 disables the cache
    pub cache_capacity: usize,
    /// Rule packs to enable: `finance`, `healthcare`
    pub packs: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: crate::classifier::DEFAULT_THRESHOLD,
            cache_capacity: crate::classifier::DEFAULT_CACHE_CAPACITY,
            packs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Cached query results to keep; 0 disables the cache
    pub cache_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_capacity: crate::discovery::DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelationshipConfig {
    /// Relation keys walked by graph construction, in edge order
    pub graph_keys: Vec<String>,
    /// Relation key used for cycle detection
    pub cycle_key: String,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            graph_keys: [PARENT, CHILDREN, DEPENDENCIES, VALIDATORS]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            cycle_key: DEPENDENCIES.to_string(),
        }
    }
}

/// Returns the path to the home directory (~/.semantic-protocol)
pub fn config_home() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".semantic-protocol"))
}

/// Default location of config.toml
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_home()?.join("config.toml"))
}

/// Load configuration from the default location
pub fn load_config() -> Result<Config> {
    load_config_from(&default_config_path()?)
}

/// Load configuration from `path`; a missing file yields defaults
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    if config.classifier.threshold > 100 {
        anyhow::bail!(
            "classifier.threshold must be between 0 and 100, got {}",
            config.classifier.threshold
        );
    }
    Ok(config)
}
