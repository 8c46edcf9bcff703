//! Config - Race setup loaded from defaults or JSON
//!
//! Every field has a default, so a partial JSON document only overrides what
//! it names.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::game_server::ai::PolicyKind;
use crate::game_server::sensors::SensorConfig;
use crate::game_server::track::{Track, TrackError};
use crate::game_server::vehicle::VehicleParams;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error(transparent)]
    Track(#[from] TrackError),
}

/// Track area and road width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub width: f32,
    pub height: f32,
    pub track_width: f32,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            width: 2400.0,
            height: 1800.0,
            track_width: 120.0,
        }
    }
}

impl TrackConfig {
    /// Build the standard circuit at this size
    pub fn build(&self) -> Result<Track, TrackError> {
        Track::circuit(self.width, self.height, self.track_width)
    }
}

/// One computer-controlled car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpponentConfig {
    pub name: String,
    pub color: String,
    pub policy: PolicyKind,
    /// 0-1, higher is more challenging
    pub difficulty: f32,
    pub vehicle: VehicleParams,
}

impl Default for OpponentConfig {
    fn default() -> Self {
        Self {
            name: "AI".to_string(),
            color: "#F97316".to_string(),
            policy: PolicyKind::Neural,
            difficulty: 0.85,
            vehicle: VehicleParams::opponent(),
        }
    }
}

/// Race configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Seed for every AI policy's random stream
    pub seed: u64,
    /// Countdown before the race goes green (seconds)
    pub countdown: f32,
    /// Laps to finish; `None` races until reset
    pub laps: Option<u32>,
    pub track: TrackConfig,
    pub player_name: String,
    pub player_color: String,
    pub player: VehicleParams,
    pub player_sensors: SensorConfig,
    /// Closest sensor reading that still counts as a clean lap
    pub player_collision_distance: f32,
    pub opponents: Vec<OpponentConfig>,
    /// Spacing of the starting grid, sideways and between rows
    pub grid_spacing: f32,
    /// Largest wall-clock delta a single tick may integrate (seconds)
    pub max_delta: f32,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            countdown: 3.0,
            laps: None,
            track: TrackConfig::default(),
            player_name: "Player".to_string(),
            player_color: "#8B5CF6".to_string(),
            player: VehicleParams::player(),
            player_sensors: SensorConfig::player(),
            player_collision_distance: 15.0,
            opponents: vec![OpponentConfig::default()],
            grid_spacing: 40.0,
            max_delta: 0.1,
        }
    }
}

impl RaceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Reject values the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.countdown >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "countdown must be non-negative, got {}",
                self.countdown
            )));
        }
        if self.laps == Some(0) {
            return Err(ConfigError::Invalid("laps must be at least 1".to_string()));
        }
        if !(self.max_delta > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_delta must be positive, got {}",
                self.max_delta
            )));
        }
        if !(self.grid_spacing >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "grid_spacing must be non-negative, got {}",
                self.grid_spacing
            )));
        }
        if self.player_sensors.ray_count == 0 || !(self.player_sensors.ray_length > 0.0) {
            return Err(ConfigError::Invalid(
                "player sensors need at least one ray of positive length".to_string(),
            ));
        }

        validate_vehicle("player", &self.player)?;
        for opponent in &self.opponents {
            validate_vehicle(&opponent.name, &opponent.vehicle)?;
            if !(0.0..=1.0).contains(&opponent.difficulty) {
                return Err(ConfigError::Invalid(format!(
                    "{}: difficulty must be within 0-1, got {}",
                    opponent.name, opponent.difficulty
                )));
            }
        }

        self.track.build()?;
        Ok(())
    }
}

fn validate_vehicle(name: &str, params: &VehicleParams) -> Result<(), ConfigError> {
    let positive = [
        ("max_velocity", params.max_velocity),
        ("acceleration", params.acceleration),
        ("deceleration", params.deceleration),
        ("turn_speed", params.turn_speed),
        ("width", params.width),
        ("height", params.height),
    ];
    if let Some((field, value)) = positive.iter().find(|(_, v)| !(*v > 0.0)) {
        return Err(ConfigError::Invalid(format!(
            "{name}: {field} must be positive, got {value}"
        )));
    }
    if !(params.boost_multiplier >= 1.0) {
        return Err(ConfigError::Invalid(format!(
            "{name}: boost_multiplier must be at least 1, got {}",
            params.boost_multiplier
        )));
    }
    if !(params.friction > 0.0 && params.friction <= 1.0) {
        return Err(ConfigError::Invalid(format!(
            "{name}: friction must be within (0, 1], got {}",
            params.friction
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        RaceConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let config = RaceConfig::from_json_str(
            r#"{ "laps": 3, "opponents": [{ "policy": "rule_based", "difficulty": 0.5 }] }"#,
        )
        .expect("valid config");
        assert_eq!(config.laps, Some(3));
        assert_eq!(config.opponents.len(), 1);
        assert_eq!(config.opponents[0].policy, PolicyKind::RuleBased);
        assert_eq!(config.opponents[0].vehicle, VehicleParams::opponent());
        assert_eq!(config.track, TrackConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            RaceConfig::from_json_str(r#"{ "laps": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RaceConfig::from_json_str(r#"{ "player": { "friction": 1.5 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            RaceConfig::from_json_str(r#"{ "track": { "width": -1.0 } }"#),
            Err(ConfigError::Track(TrackError::InvalidExtent { .. }))
        ));
        assert!(matches!(
            RaceConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
