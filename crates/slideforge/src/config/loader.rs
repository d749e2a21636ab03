use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let min_score = config.matching.min_score;
    if !(0.0..=1.0).contains(&min_score) {
        return Err(ConfigError::Validation {
            message: format!("matching.min_score must be in [0.0, 1.0], got {}", min_score),
        });
    }

    let share = config.matching.max_source_share;
    if !(share > 0.0 && share <= 1.0) {
        return Err(ConfigError::Validation {
            message: format!(
                "matching.max_source_share must be in (0.0, 1.0], got {}",
                share
            ),
        });
    }

    if config.scorer.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "scorer.max_attempts must be at least 1".to_string(),
        });
    }

    Ok(())
}
