use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default = "default_version")]
    pub version: f32,
    pub model_path: PathBuf,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    #[serde(default = "default_conf_threshold")]
    pub conf_threshold: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    pub names: Vec<String>,
}

fn default_version() -> f32 {
    1.0
}

fn default_input_size() -> u32 {
    640
}

fn default_conf_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.45
}

impl DetectorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig = serde_yaml::from_str(config_str)?;
        if config.names.iter().all(|name| name.trim().is_empty()) {
            return Err(ConfigError::NoClassNames);
        }
        if config.input_size == 0 {
            return Err(ConfigError::Invalid {
                key: "input_size",
                value: config.input_size.to_string(),
            });
        }
        check_threshold("conf_threshold", config.conf_threshold)?;
        check_threshold("iou_threshold", config.iou_threshold)?;
        Ok(config)
    }

    /// Label for a class index, `None` when the model emits an id the
    /// vocabulary does not cover.
    pub fn label(&self, class_id: usize) -> Option<&str> {
        self.names
            .get(class_id)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

/// Thresholds must lie strictly between 0 and 1; NaN is rejected too.
fn check_threshold(key: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        })
    }
}
