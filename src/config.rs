use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Win-game-ETA driven scoring with speculative placement.
    #[default]
    Smart,
    /// Speedup and ETA ranking only.
    Fast,
}

/// Per-robot tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotParameters {
    pub strategy: Strategy,
    pub max_game_length: u32,
    pub max_eta: u32,
    pub eta_bonus_factor: f64,
    pub adversarial_factor: f64,
    pub leader_adversarial_factor: f64,
    pub dev_card_multiplier: f64,
    pub threat_multiplier: f64,
    pub trading: bool,
    pub partial_offer_probability: f64,
}

impl Default for RobotParameters {
    fn default() -> Self {
        Self {
            strategy: Strategy::Smart,
            max_game_length: 300,
            max_eta: 99,
            eta_bonus_factor: 0.8,
            adversarial_factor: 1.5,
            leader_adversarial_factor: 3.0,
            dev_card_multiplier: 2.0,
            threat_multiplier: 1.1,
            trading: true,
            partial_offer_probability: 0.5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid parameter file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("unknown strategy {0:?}")]
    UnknownStrategy(String),
}

impl RobotParameters {
    pub fn fast() -> Self {
        Self {
            strategy: Strategy::Fast,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let params: RobotParameters = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("eta_bonus_factor", self.eta_bonus_factor),
            ("adversarial_factor", self.adversarial_factor),
            ("leader_adversarial_factor", self.leader_adversarial_factor),
            ("dev_card_multiplier", self.dev_card_multiplier),
            ("threat_multiplier", self.threat_multiplier),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.partial_offer_probability) {
            return Err(ConfigError::OutOfRange {
                field: "partial_offer_probability",
                value: self.partial_offer_probability,
            });
        }
        if self.max_game_length == 0 {
            return Err(ConfigError::OutOfRange {
                field: "max_game_length",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Applies a seat-code suffix such as `notrade` or `fast`.
    pub fn apply_flag(&mut self, flag: &str) -> Result<(), ConfigError> {
        match flag.to_ascii_lowercase().as_str() {
            "notrade" => self.trading = false,
            "trade" => self.trading = true,
            other => {
                self.strategy = Strategy::from_str(&other.to_ascii_uppercase())
                    .map_err(|_| ConfigError::UnknownStrategy(other.to_string()))?;
            }
        }
        Ok(())
    }
}
