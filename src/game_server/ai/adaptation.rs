//! Difficulty adaptation ("rubber-banding")
//!
//! Skill tracks a rolling average of the player's speed plus a bounded term
//! from how far apart the two cars are. The gap is raw track-space distance
//! over a fixed 1000-unit scale, so the pull is stronger on larger tracks.

use serde::Serialize;
use std::collections::VecDeque;

use crate::game_server::geometry::Point;
use crate::game_server::vehicle::VehicleSnapshot;

#[derive(Debug, Clone, Serialize)]
pub struct AdaptationController {
    #[serde(skip)]
    player_speeds: VecDeque<f32>,
    skill_level: f32,
    adaptation_rate: f32,
    rubberband_factor: f32,
    aggressiveness: f32,
    drift_probability: f32,
}

impl AdaptationController {
    pub const HISTORY_LEN: usize = 100;
    pub const SKILL_MIN: f32 = 0.2;
    pub const SKILL_MAX: f32 = 0.95;
    /// Player speed treated as flawless driving
    const REFERENCE_TOP_SPEED: f32 = 350.0;
    const RUBBERBAND_LIMIT: f32 = 0.2;
    const RUBBERBAND_SCALE: f32 = 1000.0;
    const BASE_MAX_VELOCITY: f32 = 280.0;
    const SKILL_MAX_VELOCITY: f32 = 70.0;
    const CATCH_UP_DISTANCE: f32 = 500.0;
    const CATCH_UP_FACTOR: f32 = 1.2;

    /// Start at `difficulty` skill; harder opponents also adapt faster
    pub fn new(difficulty: f32) -> Self {
        let skill_level = difficulty.clamp(Self::SKILL_MIN, Self::SKILL_MAX);
        Self {
            player_speeds: VecDeque::with_capacity(Self::HISTORY_LEN),
            skill_level,
            adaptation_rate: 0.05 * (1.0 + difficulty),
            rubberband_factor: 0.3,
            aggressiveness: skill_level * 0.8,
            drift_probability: skill_level * 0.5,
        }
    }

    pub fn skill_level(&self) -> f32 {
        self.skill_level
    }

    pub fn aggressiveness(&self) -> f32 {
        self.aggressiveness
    }

    pub fn drift_probability(&self) -> f32 {
        self.drift_probability
    }

    pub fn samples(&self) -> usize {
        self.player_speeds.len()
    }

    /// Mean of the recorded player speeds, 0 when empty
    pub fn average_player_speed(&self) -> f32 {
        if self.player_speeds.is_empty() {
            return 0.0;
        }
        self.player_speeds.iter().sum::<f32>() / self.player_speeds.len() as f32
    }

    /// Signed catch-up term in `[-0.2, 0.2]`; positive while the player leads
    pub fn rubberband_adjustment(&self, ai_position: Point, player_position: Point) -> f32 {
        let distance = ai_position.distance_to(player_position);
        let direction = if player_position.x > ai_position.x {
            1.0
        } else {
            -1.0
        };
        (distance / Self::RUBBERBAND_SCALE * self.rubberband_factor * direction)
            .clamp(-Self::RUBBERBAND_LIMIT, Self::RUBBERBAND_LIMIT)
    }

    /// Fold one observation of the player into skill; returns the new top speed
    pub fn adapt(&mut self, ai_position: Point, player: &VehicleSnapshot, dt: f32) -> f32 {
        let player_speed = if player.speed.is_finite() {
            player.speed.max(0.0)
        } else {
            0.0
        };

        self.player_speeds.push_back(player_speed);
        if self.player_speeds.len() > Self::HISTORY_LEN {
            self.player_speeds.pop_front();
        }

        let normalized_performance =
            (self.average_player_speed() / Self::REFERENCE_TOP_SPEED).clamp(0.0, 1.0);
        let target_skill = normalized_performance * 0.7 + 0.3;
        let rubberband = self.rubberband_adjustment(ai_position, player.position);

        self.skill_level +=
            (target_skill + rubberband - self.skill_level) * self.adaptation_rate * dt.max(0.0);
        self.skill_level = self.skill_level.clamp(Self::SKILL_MIN, Self::SKILL_MAX);

        self.aggressiveness = self.skill_level * 0.8;
        self.drift_probability = self.skill_level * 0.5;

        let mut max_velocity = Self::BASE_MAX_VELOCITY + self.skill_level * Self::SKILL_MAX_VELOCITY;
        // Never let a distant leader run away
        let distance = ai_position.distance_to(player.position);
        if distance > Self::CATCH_UP_DISTANCE && player.position.x > ai_position.x {
            max_velocity = max_velocity.max(player_speed * Self::CATCH_UP_FACTOR);
        }
        max_velocity
    }
}
