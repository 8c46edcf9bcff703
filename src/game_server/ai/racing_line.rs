//! Racing-line steering
//!
//! The refined rule-based driver: it aims at a point a few waypoints ahead on
//! the racing line, leans away from the side with less clearance on a short
//! five-ray fan, and adjusts its pace when racing close to the opponent.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use crate::game_server::ai::DecisionContext;
use crate::game_server::sensors::SensorConfig;
use crate::game_server::vehicle::{ControlIntent, Steer, Throttle};

#[derive(Debug, Clone)]
pub struct RacingLinePolicy {
    pub difficulty: f32,
    pub reaction_time: f32,
    /// Waypoints ahead of the nearest one to aim at
    pub lookahead: usize,
    /// Speed the car settles at when not pushing
    pub preferred_speed_ratio: f32,
    /// 0-1 steering commitment
    pub aggressiveness: f32,
    base_aggressiveness: f32,
    since_decision: f32,
    rng: StdRng,
}

impl RacingLinePolicy {
    /// Short forward/side fan, leftmost ray first
    pub const SENSOR_FAN: SensorConfig = SensorConfig {
        ray_count: 5,
        ray_length: 120.0,
        spread: PI * 2.0 / 3.0,
    };

    const STEER_DEADBAND: f32 = 0.05;
    const MAX_THROTTLE_ERROR: f32 = 0.8;
    const BOOST_MAX_ERROR: f32 = 0.2;
    const BOOST_CHANCE: f32 = 0.1;
    /// Heading bias per unit of normalised clearance imbalance
    const AVOIDANCE_GAIN: f32 = 0.5;
    const BLOCKED_CLEARANCE: f32 = 40.0;
    const LOOKAHEAD_DISTANCE: f32 = 50.0;
    const PROXIMITY: f32 = 200.0;
    const CRUISE_RATIO: f32 = 0.95;
    const DEFEND_RATIO: f32 = 0.9;

    pub fn new(difficulty: f32, seed: u64) -> Self {
        let base_aggressiveness = (0.5 + difficulty * 0.4).clamp(0.0, 1.0);
        Self {
            difficulty,
            reaction_time: 0.15,
            lookahead: 4,
            preferred_speed_ratio: Self::CRUISE_RATIO,
            aggressiveness: base_aggressiveness,
            base_aggressiveness,
            since_decision: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Positive when the right side is clearer, scaled to `[-GAIN, GAIN]`
    fn clearance_bias(sensors: &[f32]) -> f32 {
        if sensors.len() < 5 {
            return 0.0;
        }
        let left = (sensors[0] + sensors[1]) / 2.0;
        let right = (sensors[3] + sensors[4]) / 2.0;
        (right - left) / Self::SENSOR_FAN.ray_length * Self::AVOIDANCE_GAIN
    }

    /// Retune pace and aggressiveness from the gap to the opponent
    fn adjust_for_opponent(&mut self, ctx: &DecisionContext<'_>) {
        let gap = ctx.vehicle.position.distance_to(ctx.opponent.position);
        if gap >= Self::PROXIMITY {
            self.preferred_speed_ratio = Self::CRUISE_RATIO;
            self.aggressiveness = self.base_aggressiveness;
        } else if ctx.is_ahead_of_opponent() {
            self.preferred_speed_ratio = Self::DEFEND_RATIO;
            self.aggressiveness = self.base_aggressiveness;
        } else {
            self.preferred_speed_ratio = 1.0;
            self.aggressiveness = (self.base_aggressiveness + 0.2).min(1.0);
        }
    }

    pub fn decide(&mut self, ctx: &DecisionContext<'_>, dt: f32) -> ControlIntent {
        self.since_decision += dt;
        if self.since_decision < self.reaction_time {
            return ControlIntent::idle();
        }
        self.since_decision = 0.0;

        self.adjust_for_opponent(ctx);

        let vehicle = ctx.vehicle;
        let target = ctx
            .racing_line
            .lookahead(vehicle.position, self.lookahead)
            .unwrap_or_else(|| ctx.target_checkpoint());
        let heading_error = ctx.bearing_error(target);
        let angle_diff = heading_error + Self::clearance_bias(ctx.sensors);

        let centre_clear = ctx
            .sensors
            .get(ctx.sensors.len() / 2)
            .copied()
            .unwrap_or(Self::SENSOR_FAN.ray_length);
        let ahead = vehicle
            .position
            .project(vehicle.angle, Self::LOOKAHEAD_DISTANCE);
        let collision_ahead =
            centre_clear < Self::BLOCKED_CLEARANCE || ctx.track.is_point_out_of_bounds(ahead);

        let steer = if angle_diff > Self::STEER_DEADBAND {
            Steer::Right
        } else if angle_diff < -Self::STEER_DEADBAND {
            Steer::Left
        } else {
            Steer::Straight
        };
        let mut steer_dt = self.reaction_time * self.aggressiveness;
        if collision_ahead {
            steer_dt *= 2.0;
        }

        let preferred_speed = vehicle.max_velocity * self.preferred_speed_ratio;
        let (throttle, boost) =
            if collision_ahead || heading_error.abs() >= Self::MAX_THROTTLE_ERROR {
                (Throttle::Brake, false)
            } else if vehicle.speed() < preferred_speed {
                let boost = heading_error.abs() < Self::BOOST_MAX_ERROR
                    && !ctx.is_ahead_of_opponent()
                    && self.rng.gen::<f32>() < self.difficulty * Self::BOOST_CHANCE;
                (Throttle::Accelerate, boost)
            } else {
                (Throttle::Release, false)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_server::ai::test_support::*;
    use crate::game_server::geometry::{heading_to, Point};
    use crate::game_server::progress::CheckpointProgress;
    use crate::game_server::racing_line::RacingLine;
    use crate::game_server::sensors::Pose;

    #[test]
    fn clearance_bias_leans_toward_open_side() {
        assert!(RacingLinePolicy::clearance_bias(&[20.0, 20.0, 120.0, 120.0, 120.0]) > 0.0);
        assert!(RacingLinePolicy::clearance_bias(&[120.0, 120.0, 120.0, 10.0, 30.0]) < 0.0);
        assert_eq!(RacingLinePolicy::clearance_bias(&[120.0; 5]), 0.0);
        assert_eq!(RacingLinePolicy::clearance_bias(&[]), 0.0);
    }

    #[test]
    fn pushes_harder_when_trailing_close_behind() {
        let track = track();
        let line = RacingLine::build(track.checkpoints());
        let mut progress = CheckpointProgress::new(track.checkpoints().len());
        progress.record_crossing(0);

        let start = track.checkpoint(0).lerp(track.checkpoint(1), 0.3);
        let car = car_at(start, heading_to(start, track.checkpoint(1)));
        let sensors = RacingLinePolicy::SENSOR_FAN.cast(
            Pose {
                position: car.position,
                angle: car.angle,
            },
            track.barriers(),
        );
        let opponent = opponent_at(track.checkpoint(0).lerp(track.checkpoint(1), 0.6), 2);
        let ctx = DecisionContext {
            vehicle: &car,
            track: &track,
            racing_line: &line,
            sensors: &sensors,
            progress: &progress,
            opponent: &opponent,
        };

        let mut policy = RacingLinePolicy::new(0.85, 11);
        let base = policy.aggressiveness;
        policy.decide(&ctx, 0.2);
        assert_eq!(policy.preferred_speed_ratio, 1.0);
        assert!(policy.aggressiveness > base);

        let far = opponent_at(Point::new(10.0, 10.0), 2);
        let ctx = DecisionContext {
            opponent: &far,
            ..ctx
        };
        policy.decide(&ctx, 0.2);
        assert_eq!(policy.preferred_speed_ratio, RacingLinePolicy::CRUISE_RATIO);
        assert_eq!(policy.aggressiveness, base);
    }

    #[test]
    fn releases_once_above_preferred_speed() {
        let track = track();
        let line = RacingLine::build(track.checkpoints());
        let mut progress = CheckpointProgress::new(track.checkpoints().len());
        progress.record_crossing(0);

        let start = track.checkpoint(0).lerp(track.checkpoint(1), 0.3);
        let target = line.lookahead(start, 4).expect("line exists");
        let mut car = car_at(start, heading_to(start, target));
        car.velocity = car.max_velocity;
        let opponent = opponent_at(Point::new(10.0, 10.0), 0);
        let ctx = DecisionContext {
            vehicle: &car,
            track: &track,
            racing_line: &line,
            sensors: &[120.0; 5],
            progress: &progress,
            opponent: &opponent,
        };

        let mut policy = RacingLinePolicy::new(0.85, 5);
        let intent = policy.decide(&ctx, 0.2);
        assert_eq!(intent.throttle, Throttle::Release);
    }

    #[test]
    fn road_ending_ahead_brakes_with_doubled_steering() {
        let track = track();
        let line = RacingLine::build(track.checkpoints());
        let mut progress = CheckpointProgress::new(track.checkpoints().len());
        progress.record_crossing(0);
        let opponent = opponent_at(Point::new(10.0, 10.0), 0);

        let car = facing_barrier(&track, 45.0);
        let ctx = DecisionContext {
            vehicle: &car,
            track: &track,
            racing_line: &line,
            sensors: &[120.0; 5],
            progress: &progress,
            opponent: &opponent,
        };
        let mut policy = RacingLinePolicy::new(1.0, 9);
        let intent = policy.decide(&ctx, 0.2);
        assert_eq!(intent.throttle, Throttle::Brake);
        assert_eq!(intent.boost, Some(false));
        assert_eq!(
            intent.steer_dt,
            policy.reaction_time * policy.aggressiveness * 2.0
        );
    }

    #[test]
    fn blocked_centre_ray_brakes_on_an_open_road() {
        let track = track();
        let line = RacingLine::build(track.checkpoints());
        let mut progress = CheckpointProgress::new(track.checkpoints().len());
        progress.record_crossing(0);

        let start = track.checkpoint(0).lerp(track.checkpoint(1), 0.3);
        let target = line.lookahead(start, 4).expect("line exists");
        let car = car_at(start, heading_to(start, target));
        let opponent = opponent_at(Point::new(10.0, 10.0), 0);
        let ctx = DecisionContext {
            vehicle: &car,
            track: &track,
            racing_line: &line,
            sensors: &[120.0, 120.0, 30.0, 120.0, 120.0],
            progress: &progress,
            opponent: &opponent,
        };

        let mut policy = RacingLinePolicy::new(0.85, 5);
        let intent = policy.decide(&ctx, 0.2);
        assert_eq!(intent.throttle, Throttle::Brake);
        assert_eq!(
            intent.steer_dt,
            policy.reaction_time * policy.aggressiveness * 2.0
        );

        let clear = DecisionContext {
            sensors: &[120.0; 5],
            ..ctx
        };
        assert_eq!(policy.decide(&clear, 0.2).throttle, Throttle::Accelerate);
    }
}
