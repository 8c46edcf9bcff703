//! Rule-based steering (Basic AI)
//!
//! Decisions are only recomputed every `reaction_time` seconds; in between the
//! car coasts on physics alone.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::game_server::ai::DecisionContext;
use crate::game_server::vehicle::{ControlIntent, Steer, Throttle};

/// Checkpoint-chasing heuristic driver
#[derive(Debug, Clone)]
pub struct RuleBasedPolicy {
    /// 0-1, higher is more challenging
    pub difficulty: f32,
    /// Seconds between decisions
    pub reaction_time: f32,
    since_decision: f32,
    rng: StdRng,
}

impl RuleBasedPolicy {
    const STEER_DEADBAND: f32 = 0.1;
    const MAX_THROTTLE_ERROR: f32 = 0.8;
    const LOOKAHEAD_DISTANCE: f32 = 50.0;
    const BOOST_CHANCE: f32 = 0.1;

    pub fn new(difficulty: f32, seed: u64) -> Self {
        Self {
            difficulty,
            reaction_time: 0.2,
            since_decision: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn decide(&mut self, ctx: &DecisionContext<'_>, dt: f32) -> ControlIntent {
        self.since_decision += dt;
        if self.since_decision < self.reaction_time {
            return ControlIntent::idle();
        }
        self.since_decision = 0.0;

        let angle_diff = ctx.bearing_error(ctx.target_checkpoint());
        let vehicle = ctx.vehicle;
        let ahead = vehicle
            .position
            .project(vehicle.angle, Self::LOOKAHEAD_DISTANCE);
        let collision_ahead = ctx.track.is_point_out_of_bounds(ahead);

        let steer = if angle_diff > Self::STEER_DEADBAND {
            Steer::Right
        } else if angle_diff < -Self::STEER_DEADBAND {
            Steer::Left
        } else {
            Steer::Straight
        };
        // Sharper avoidance when the road ahead is blocked
        let steer_dt = if collision_ahead {
            self.reaction_time * 2.0
        } else {
            self.reaction_time
        };

        let (throttle, boost) = if !collision_ahead && angle_diff.abs() < Self::MAX_THROTTLE_ERROR {
            // Trailing cars boost more often
            let boost = !ctx.is_ahead_of_opponent()
                && self.rng.gen::<f32>() < self.difficulty * Self::BOOST_CHANCE;
            (Throttle::Accelerate, boost)
        } else {
            (Throttle::Brake, false)
        };

        ControlIntent {
            steer,
            steer_dt,
            throttle,
            throttle_dt: self.reaction_time,
            drift: None,
            boost: Some(boost),
        }
    }
}
