//! AI - Steering policies for computer-controlled cars
//!
//! One vehicle type, three interchangeable decision policies. Swapping the AI
//! type replaces the policy value and keeps the car where it is.

pub mod adaptation;
pub mod network;
pub mod neural;
pub mod racing_line;
pub mod rule_based;

use serde::{Deserialize, Serialize};

use crate::game_server::geometry::{heading_to, normalize_angle, Point};
use crate::game_server::progress::CheckpointProgress;
use crate::game_server::racing_line::RacingLine;
use crate::game_server::sensors::SensorConfig;
use crate::game_server::track::Track;
use crate::game_server::vehicle::{ControlIntent, Vehicle, VehicleSnapshot};

pub use adaptation::AdaptationController;
pub use neural::NeuralPolicy;
pub use racing_line::RacingLinePolicy;
pub use rule_based::RuleBasedPolicy;

/// Which decision policy drives an AI car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Basic AI: checkpoint bearing with fixed heuristics
    RuleBased,
    /// Rule-based AI steering at a racing-line lookahead point
    RacingLine,
    /// Enhanced AI: neural network with difficulty adaptation
    #[default]
    Neural,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::RuleBased => "Basic AI",
            PolicyKind::RacingLine => "Racing Line AI",
            PolicyKind::Neural => "Enhanced AI",
        }
    }

    /// Basic/enhanced toggle
    pub fn toggled(self) -> Self {
        match self {
            PolicyKind::Neural => PolicyKind::RuleBased,
            PolicyKind::RuleBased | PolicyKind::RacingLine => PolicyKind::Neural,
        }
    }
}

/// Everything a policy may read when deciding
pub struct DecisionContext<'a> {
    pub vehicle: &'a Vehicle,
    pub track: &'a Track,
    pub racing_line: &'a RacingLine,
    /// Readings from this policy's own sensor fan (empty if it has none)
    pub sensors: &'a [f32],
    pub progress: &'a CheckpointProgress,
    /// The tracked human opponent
    pub opponent: &'a VehicleSnapshot,
}

impl DecisionContext<'_> {
    /// Signed heading error toward `target`, in `(-PI, PI]`
    pub fn bearing_error(&self, target: Point) -> f32 {
        normalize_angle(heading_to(self.vehicle.position, target) - self.vehicle.angle)
    }

    pub fn target_checkpoint(&self) -> Point {
        self.track.checkpoint(self.progress.target_checkpoint())
    }

    pub fn distance_to_target(&self) -> f32 {
        self.progress
            .distance_to_target(self.vehicle.position, self.track.checkpoints())
    }

    /// Whether this car leads the opponent in checkpoint order
    ///
    /// On the same target, the car closer to that checkpoint leads.
    pub fn is_ahead_of_opponent(&self) -> bool {
        let mine = self.progress.target_checkpoint();
        let theirs = self.opponent.target_checkpoint;
        if mine != theirs {
            return mine > theirs;
        }

        let checkpoint = self.target_checkpoint();
        self.vehicle.position.distance_to(checkpoint)
            < self.opponent.position.distance_to(checkpoint)
    }
}

/// A steering policy owned by exactly one AI car
#[derive(Debug, Clone)]
pub enum SteeringPolicy {
    RuleBased(RuleBasedPolicy),
    RacingLine(RacingLinePolicy),
    Neural(Box<NeuralPolicy>),
}

impl SteeringPolicy {
    /// Build a fresh policy of `kind`
    pub fn new(kind: PolicyKind, difficulty: f32, seed: u64) -> Self {
        match kind {
            PolicyKind::RuleBased => Self::RuleBased(RuleBasedPolicy::new(difficulty, seed)),
            PolicyKind::RacingLine => Self::RacingLine(RacingLinePolicy::new(difficulty, seed)),
            PolicyKind::Neural => Self::Neural(Box::new(NeuralPolicy::new(difficulty, seed))),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        match self {
            Self::RuleBased(_) => PolicyKind::RuleBased,
            Self::RacingLine(_) => PolicyKind::RacingLine,
            Self::Neural(_) => PolicyKind::Neural,
        }
    }

    /// Sensor fan to cast before `decide`, if the policy uses one
    pub fn sensor_config(&self) -> Option<SensorConfig> {
        match self {
            Self::RuleBased(_) => None,
            Self::RacingLine(_) => Some(RacingLinePolicy::SENSOR_FAN),
            Self::Neural(policy) => Some(policy.sensor_config()),
        }
    }

    /// Per-tick retuning of the car before it decides
    pub fn prepare(&mut self, vehicle: &mut Vehicle, opponent: &VehicleSnapshot, dt: f32) {
        if let Self::Neural(policy) = self {
            policy.adapt_to_player(vehicle, opponent, dt);
        }
    }

    /// Control intent for this tick
    pub fn decide(&mut self, ctx: &DecisionContext<'_>, dt: f32) -> ControlIntent {
        match self {
            Self::RuleBased(policy) => policy.decide(ctx, dt),
            Self::RacingLine(policy) => policy.decide(ctx, dt),
            Self::Neural(policy) => policy.decide(ctx, dt),
        }
    }

    /// Hook for a completed lap; the neural policy learns here
    pub fn on_lap_completed(&mut self) {
        if let Self::Neural(policy) = self {
            policy.learn();
        }
    }

    /// Adaptive skill level, neural policy only
    pub fn skill_level(&self) -> Option<f32> {
        match self {
            Self::Neural(policy) => Some(policy.skill_level()),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::game_server::vehicle::VehicleParams;

    pub fn track() -> Track {
        Track::circuit(2400.0, 1800.0, 120.0).expect("standard circuit is valid")
    }

    pub fn car_at(position: Point, angle: f32) -> Vehicle {
        Vehicle::new(1, "ai", "#F97316", &VehicleParams::opponent(), position, angle)
    }

    /// Car `distance` inside the first barrier, pointed straight at it
    pub fn facing_barrier(track: &Track, distance: f32) -> Vehicle {
        let barrier = track.barriers()[0];
        let wall = barrier.start().lerp(barrier.end(), 0.5);
        let centre = track.checkpoint(0).lerp(track.checkpoint(1), 0.5);
        let heading = heading_to(centre, wall);
        car_at(wall.project(heading + std::f32::consts::PI, distance), heading)
    }

    pub fn opponent_at(position: Point, target_checkpoint: usize) -> VehicleSnapshot {
        let mut snapshot =
            Vehicle::new(0, "player", "#8B5CF6", &VehicleParams::player(), position, 0.0)
                .snapshot();
        snapshot.target_checkpoint = target_checkpoint;
        snapshot
    }
}
