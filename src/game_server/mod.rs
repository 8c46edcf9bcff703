//! Game Server Module
//!
//! Vehicle physics, sensors and AI steering for a top-down circuit racer.
//! Communicates with the JS frontend via Tauri commands.

pub mod ai;
pub mod config;
pub mod geometry;
pub mod progress;
pub mod race;
pub mod racing_line;
pub mod sensors;
pub mod simulation;
pub mod track;
pub mod vehicle;

pub use ai::{PolicyKind, SteeringPolicy};
pub use config::{ConfigError, OpponentConfig, RaceConfig, TrackConfig};
pub use geometry::{Point, Segment};
pub use race::{Race, RaceEvent, RaceSnapshot, RaceStatus};
pub use sensors::{cast_rays, SensorConfig};
pub use simulation::{GameServer, GameState, ServerError, ServerStats};
pub use track::{Track, TrackError};
pub use vehicle::{ControlIntent, PlayerInput, Vehicle, VehicleParams, VehicleSnapshot};
