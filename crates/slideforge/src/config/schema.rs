//! Configuration schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,

    /// Root for the database and uploaded files. Defaults to `~/.slideforge`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub scorer: ScorerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchingConfig {
    /// Minimum combined relevance for a slide to be considered at all.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Maximum fraction of a generated deck a single source may supply.
    #[serde(default = "default_max_source_share")]
    pub max_source_share: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScorerConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_min_score() -> f32 {
    0.35
}

fn default_max_source_share() -> f32 {
    0.4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: None,
            matching: MatchingConfig::default(),
            scorer: ScorerConfig::default(),
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: default_min_score(),
            max_source_share: default_max_source_share(),
        }
    }
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}
