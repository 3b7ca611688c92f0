use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use crate::constant::{Const, DataError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: 5,
            slow: 34,
            signal: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    /// Minimum merged-bar index distance between the tail fractal and a
    /// candidate for time confirmation.
    pub min_gap: usize,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            min_gap: Const::DEFAULT_STROKE_MIN_GAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    pub bootstrap_points: usize,
    /// `None` lets the chain grow as deep as the data allows.
    pub max_levels: Option<usize>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            bootstrap_points: Const::DEFAULT_BOOTSTRAP_POINTS,
            max_levels: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub macd: MacdConfig,
    pub stroke: StrokeConfig,
    pub level: LevelConfig,
}

impl EngineConfig {
    /// Reads a config file, choosing the parser by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;

        let config: EngineConfig = match path.extension().and_then(|x| x.to_str()) {
            Some("json") => {
                let value: JsonValue = serde_json::from_str(&text)?;
                serde_json::from_value(value)?
            }
            Some("yaml") | Some("yml") => {
                let value: YamlValue = serde_yaml::from_str(&text)?;
                serde_yaml::from_value(value)?
            }
            _ => return Err(DataError::UnsupportedFormat(path.display().to_string())),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        let macd = &self.macd;
        if macd.fast == 0 || macd.slow == 0 || macd.signal == 0 {
            return Err(DataError::InvalidConfig("macd periods must be > 0".into()));
        }
        if self.stroke.min_gap < 2 {
            return Err(DataError::InvalidConfig(format!(
                "stroke.min_gap must be >= 2, got {}",
                self.stroke.min_gap
            )));
        }
        if self.level.bootstrap_points < Const::DEFAULT_BOOTSTRAP_POINTS {
            return Err(DataError::InvalidConfig(format!(
                "level.bootstrap_points must be >= {}, got {}",
                Const::DEFAULT_BOOTSTRAP_POINTS,
                self.level.bootstrap_points
            )));
        }
        if self.level.max_levels == Some(0) {
            return Err(DataError::InvalidConfig("level.max_levels must be > 0".into()));
        }
        Ok(())
    }
}
