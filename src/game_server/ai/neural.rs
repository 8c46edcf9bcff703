//! Neural steering (Enhanced AI)
//!
//! A 12-input network (9 rays plus speed, heading error and racing-line gap)
//! picks controls every tick. Each decision is scored and kept in a replay
//! memory; on every completed lap a batch of experiences nudges the weights
//! by reward-scaled random mutation. There is no gradient step.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::f32::consts::PI;

use crate::game_server::ai::adaptation::AdaptationController;
use crate::game_server::ai::network::{argmax, Network};
use crate::game_server::ai::DecisionContext;
use crate::game_server::sensors::SensorConfig;
use crate::game_server::vehicle::{ControlIntent, Steer, Throttle, Vehicle, VehicleSnapshot};

/// One recorded decision
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub inputs: Vec<f32>,
    pub action: usize,
    pub reward: f32,
}

/// Reward split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardBreakdown {
    /// Speed as a fraction of top speed
    pub speed: f32,
    /// Negative when a sensor reads inside the danger distance
    pub danger: f32,
    /// +0.1 when the target checkpoint got closer, -0.1 otherwise
    pub progress: f32,
    /// Up to +1 for hugging the racing line
    pub racing_line: f32,
}

impl RewardBreakdown {
    pub const PROGRESS_STEP: f32 = 0.1;
    const DANGER_DISTANCE: f32 = 30.0;
    const LINE_TOLERANCE: f32 = 50.0;

    /// Score one decision tick
    pub fn score(
        speed: f32,
        max_velocity: f32,
        sensors: &[f32],
        distance_to_checkpoint: f32,
        previous_distance: f32,
        distance_to_line: Option<f32>,
    ) -> Self {
        let speed = if max_velocity > 0.0 {
            speed / max_velocity
        } else {
            0.0
        };

        let nearest = sensors.iter().copied().fold(f32::INFINITY, f32::min);
        let danger = if nearest < Self::DANGER_DISTANCE {
            -(Self::DANGER_DISTANCE - nearest) / Self::DANGER_DISTANCE
        } else {
            0.0
        };

        let progress = if distance_to_checkpoint < previous_distance {
            Self::PROGRESS_STEP
        } else {
            -Self::PROGRESS_STEP
        };

        let racing_line =
            distance_to_line.map_or(0.0, |d| (1.0 - d / Self::LINE_TOLERANCE).max(0.0));

        Self {
            speed,
            danger,
            progress,
            racing_line,
        }
    }

    pub fn total(&self) -> f32 {
        self.speed + self.danger + self.progress + self.racing_line
    }
}

#[derive(Debug, Clone)]
pub struct NeuralPolicy {
    network: Network,
    sensor: SensorConfig,
    memory: VecDeque<Experience>,
    pub learning_rate: f32,
    /// Decays on every learning step but is not read when choosing actions;
    /// kept so the decay schedule can be observed
    pub exploration_rate: f32,
    previous_distance: f32,
    adaptation: AdaptationController,
    learn_steps: u32,
    rng: StdRng,
}

impl NeuralPolicy {
    pub const HIDDEN_SIZE: usize = 12;
    pub const OUTPUT_SIZE: usize = 4;
    pub const MEMORY_CAPACITY: usize = 1000;
    pub const BATCH_SIZE: usize = 32;
    /// Experiences needed before a lap triggers learning
    pub const MIN_EXPERIENCES: usize = 50;
    const CONFIDENCE: f32 = 0.5;
    const TURNING_OUTPUT: f32 = 0.3;
    const LINE_NORMALIZER: f32 = 100.0;
    const BOOST_CLEARANCE: f32 = 0.7;
    const BOOST_CHANCE: f32 = 0.4;
    const EXPLORATION_DECAY: f32 = 0.99;
    const EXPLORATION_FLOOR: f32 = 0.05;

    pub fn new(difficulty: f32, seed: u64) -> Self {
        Self::with_sensor(difficulty, seed, SensorConfig::opponent())
    }

    pub fn with_sensor(difficulty: f32, seed: u64, sensor: SensorConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let network = Network::new(
            &[sensor.ray_count + 3, Self::HIDDEN_SIZE, Self::OUTPUT_SIZE],
            &mut rng,
        );

        Self {
            network,
            sensor,
            memory: VecDeque::with_capacity(Self::MEMORY_CAPACITY),
            learning_rate: 0.01,
            exploration_rate: 0.2,
            previous_distance: f32::INFINITY,
            adaptation: AdaptationController::new(difficulty),
            learn_steps: 0,
            rng,
        }
    }

    pub fn sensor_config(&self) -> SensorConfig {
        self.sensor
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn adaptation(&self) -> &AdaptationController {
        &self.adaptation
    }

    pub fn skill_level(&self) -> f32 {
        self.adaptation.skill_level()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn learn_steps(&self) -> u32 {
        self.learn_steps
    }

    /// Retune skill and top speed from the player's latest state
    pub fn adapt_to_player(&mut self, vehicle: &mut Vehicle, player: &VehicleSnapshot, dt: f32) {
        vehicle.max_velocity = self.adaptation.adapt(vehicle.position, player, dt);
    }

    /// Normalised network inputs for the current state
    pub fn inputs(&self, ctx: &DecisionContext<'_>) -> Vec<f32> {
        let vehicle = ctx.vehicle;
        let mut inputs = Vec::with_capacity(self.sensor.ray_count + 3);

        inputs.extend(
            ctx.sensors
                .iter()
                .take(self.sensor.ray_count)
                .map(|d| d / self.sensor.ray_length),
        );
        inputs.resize(self.sensor.ray_count, 1.0);

        inputs.push(if vehicle.max_velocity > 0.0 {
            vehicle.speed() / vehicle.max_velocity
        } else {
            0.0
        });
        inputs.push(ctx.bearing_error(ctx.target_checkpoint()) / PI);
        inputs.push(
            ctx.racing_line
                .closest_waypoint(vehicle.position)
                .map_or(0.0, |p| {
                    (p.distance_to(vehicle.position) / Self::LINE_NORMALIZER).min(1.0)
                }),
        );

        inputs
    }

    pub fn decide(&mut self, ctx: &DecisionContext<'_>, dt: f32) -> ControlIntent {
        let inputs = self.inputs(ctx);
        let outputs = self.network.forward(&inputs);

        let centre_clear = ctx
            .sensors
            .get(ctx.sensors.len() / 2)
            .is_some_and(|&d| d > self.sensor.ray_length * Self::BOOST_CLEARANCE);
        let rng = &mut self.rng;
        let intent = Self::intent_from_outputs(
            &outputs,
            self.adaptation.skill_level(),
            ctx.vehicle,
            centre_clear,
            dt,
            || rng.gen::<f32>(),
        );

        let reward = self.score(ctx).total();
        self.record(inputs, argmax(&outputs), reward);
        intent
    }

    /// Map `[left, right, accelerate, brake]` outputs to controls
    ///
    /// Higher skill lowers the confidence threshold and lengthens each
    /// control. `roll` draws a uniform `[0, 1)` sample and is only called when
    /// a drift or boost is otherwise allowed.
    fn intent_from_outputs(
        outputs: &[f32],
        skill: f32,
        vehicle: &Vehicle,
        centre_clear: bool,
        dt: f32,
        mut roll: impl FnMut() -> f32,
    ) -> ControlIntent {
        let [left, right, accelerate, brake] = match outputs {
            [l, r, a, b, ..] => [*l, *r, *a, *b],
            _ => return ControlIntent::idle(),
        };

        let skill_modifier = 0.5 + skill * 0.5;
        let threshold = Self::CONFIDENCE / skill_modifier;
        let control_dt = dt * skill_modifier;

        let steer = if left > threshold {
            Steer::Left
        } else if right > threshold {
            Steer::Right
        } else {
            Steer::Straight
        };

        let turning = left > Self::TURNING_OUTPUT || right > Self::TURNING_OUTPUT;
        let (throttle, throttle_dt, drift) = if accelerate > brake && accelerate > threshold {
            let drift_speed = vehicle.max_velocity * (0.7 - (1.0 - skill) * 0.2);
            let drift = vehicle.speed_after_accelerate(control_dt) > drift_speed
                && turning
                && roll() < skill;
            (Throttle::Accelerate, control_dt, drift)
        } else if brake > threshold {
            (Throttle::Brake, control_dt, false)
        } else {
            (Throttle::Release, dt, false)
        };

        let boost = centre_clear && roll() < skill * Self::BOOST_CHANCE;

        ControlIntent {
            steer,
            steer_dt: control_dt,
            throttle,
            throttle_dt,
            drift: Some(drift),
            boost: Some(boost),
        }
    }

    /// Score the current state and remember the checkpoint distance
    fn score(&mut self, ctx: &DecisionContext<'_>) -> RewardBreakdown {
        let vehicle = ctx.vehicle;
        let distance = ctx.distance_to_target();
        let line_gap = ctx
            .racing_line
            .closest_waypoint(vehicle.position)
            .map(|p| p.distance_to(vehicle.position));

        let reward = RewardBreakdown::score(
            vehicle.speed(),
            vehicle.max_velocity,
            ctx.sensors,
            distance,
            self.previous_distance,
            line_gap,
        );
        self.previous_distance = distance;
        reward
    }

    fn record(&mut self, inputs: Vec<f32>, action: usize, reward: f32) {
        self.memory.push_back(Experience {
            inputs,
            action,
            reward,
        });
        if self.memory.len() > Self::MEMORY_CAPACITY {
            self.memory.pop_front();
        }
    }

    /// Mutation step over a random batch of remembered experiences
    ///
    /// Returns the number of experiences applied; nothing happens until
    /// `MIN_EXPERIENCES` have been recorded.
    pub fn learn(&mut self) -> usize {
        if self.memory.len() < Self::MIN_EXPERIENCES {
            return 0;
        }

        let batch = Self::BATCH_SIZE.min(self.memory.len());
        for _ in 0..batch {
            let index = self.rng.gen_range(0..self.memory.len());
            let reward = self.memory[index].reward;
            // Negative rewards give a zero mutation chance
            self.network
                .mutate(self.learning_rate * reward, &mut self.rng);
        }

        self.exploration_rate =
            (self.exploration_rate * Self::EXPLORATION_DECAY).max(Self::EXPLORATION_FLOOR);
        self.learn_steps += 1;

        log::debug!(
            "neural policy learned from {} experiences (step {}, exploration {:.3})",
            batch,
            self.learn_steps,
            self.exploration_rate
        );
        batch
    }
}
