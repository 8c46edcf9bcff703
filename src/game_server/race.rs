//! Race - Session state and per-tick orchestration
//!
//! Handles race setup, countdown, lap timing, events and finish detection.
//! Each racing tick drives the player first, then every opponent in index
//! order against a value snapshot of the player.

use std::collections::VecDeque;

use serde::Serialize;

use crate::game_server::ai::{DecisionContext, PolicyKind, SteeringPolicy};
use crate::game_server::config::{ConfigError, RaceConfig};
use crate::game_server::geometry::Point;
use crate::game_server::progress::{CheckpointAdvance, CheckpointProgress};
use crate::game_server::racing_line::RacingLine;
use crate::game_server::sensors::{Pose, SensorConfig};
use crate::game_server::track::{CheckpointKind, Track};
use crate::game_server::vehicle::{PlayerInput, Vehicle, VehicleSnapshot};

/// Vehicle id of the human player; opponents are numbered from 1
pub const PLAYER_ID: u32 = 0;

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    NotStarted,
    Countdown,
    Racing,
    Finished,
}

/// A finisher in a race with a lap limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceResult {
    pub vehicle_id: u32,
    pub name: String,
    pub finish_time: f32,
    pub position: u32,
}

/// Discrete notifications for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    CheckpointCrossed {
        vehicle_id: u32,
        checkpoint: usize,
        kind: CheckpointKind,
    },
    LapCompleted {
        vehicle_id: u32,
        lap: u32,
        lap_time: f32,
    },
    BestLap {
        vehicle_id: u32,
        lap_time: f32,
    },
    Collision {
        vehicle_id: u32,
    },
    PolicyChanged {
        vehicle_id: u32,
        policy: PolicyKind,
    },
    RaceFinished {
        winner_id: u32,
    },
}

/// Pending events, oldest dropped first once full
#[derive(Debug, Clone, Default)]
struct EventQueue(VecDeque<RaceEvent>);

impl EventQueue {
    fn push(&mut self, event: RaceEvent) {
        if self.0.len() >= Race::EVENT_CAPACITY {
            if let Some(dropped) = self.0.pop_front() {
                log::debug!("Event queue full, dropping {dropped:?}");
            }
        }
        self.0.push_back(event);
    }

    fn drain(&mut self) -> Vec<RaceEvent> {
        self.0.drain(..).collect()
    }
}

/// Current and best lap bookkeeping against race time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LapTimer {
    lap_start: f32,
    best: Option<f32>,
}

impl LapTimer {
    pub fn current(&self, elapsed: f32) -> f32 {
        (elapsed - self.lap_start).max(0.0)
    }

    pub fn best(&self) -> Option<f32> {
        self.best
    }

    /// Close the running lap; returns its time and whether it is a new best
    pub fn complete(&mut self, elapsed: f32) -> (f32, bool) {
        let lap_time = self.current(elapsed);
        self.lap_start = elapsed;
        let is_best = self.best.map_or(true, |best| lap_time < best);
        if is_best {
            self.best = Some(lap_time);
        }
        (lap_time, is_best)
    }
}

/// The human-driven car and its race-only extras
#[derive(Debug, Clone)]
pub struct PlayerCar {
    pub vehicle: Vehicle,
    pub progress: CheckpointProgress,
    pub timer: LapTimer,
    pub sensors: Vec<f32>,
    /// 0-100 boost reserve
    pub boost_meter: f32,
    /// Seconds spent boosting
    pub boost_time: f32,
    /// Distance covered while drifting
    pub drift_distance: f32,
}

impl PlayerCar {
    pub const BOOST_METER_MAX: f32 = 100.0;
    /// Drained per tick while boosting
    const BOOST_DRAIN: f32 = 1.0;
    /// Regained per tick while not boosting
    const BOOST_REGEN: f32 = 0.2;

    fn new(vehicle: Vehicle, progress: CheckpointProgress) -> Self {
        Self {
            vehicle,
            progress,
            timer: LapTimer::default(),
            sensors: Vec::new(),
            boost_meter: Self::BOOST_METER_MAX,
            boost_time: 0.0,
            drift_distance: 0.0,
        }
    }

    /// Spend or refill the boost meter for one tick
    fn update_boost(&mut self, wants_boost: bool, dt: f32) {
        if wants_boost && self.boost_meter > 0.0 {
            self.vehicle.activate_boost();
            self.boost_meter = (self.boost_meter - Self::BOOST_DRAIN).max(0.0);
            self.boost_time += dt;
        } else {
            self.vehicle.deactivate_boost();
            self.boost_meter = (self.boost_meter + Self::BOOST_REGEN).min(Self::BOOST_METER_MAX);
        }
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        self.vehicle.snapshot().with_progress(&self.progress)
    }
}

/// A computer-controlled car: one vehicle, one swappable policy
#[derive(Debug, Clone)]
pub struct Opponent {
    pub vehicle: Vehicle,
    pub policy: SteeringPolicy,
    pub progress: CheckpointProgress,
    pub timer: LapTimer,
    /// Readings from the policy's own sensor fan, empty if it has none
    pub sensors: Vec<f32>,
    pub difficulty: f32,
}

impl Opponent {
    /// Sense, decide and integrate one tick
    ///
    /// Returns the checkpoint advance, if any, and whether the car hit a barrier.
    fn drive(
        &mut self,
        track: &Track,
        racing_line: &RacingLine,
        player: &VehicleSnapshot,
        dt: f32,
    ) -> (Option<CheckpointAdvance>, bool) {
        self.policy.prepare(&mut self.vehicle, player, dt);

        self.sensors = match self.policy.sensor_config() {
            Some(config) => config.cast(pose_of(&self.vehicle), track.barriers()),
            None => Vec::new(),
        };

        let ctx = DecisionContext {
            vehicle: &self.vehicle,
            track,
            racing_line,
            sensors: &self.sensors,
            progress: &self.progress,
            opponent: player,
        };
        let intent = self.policy.decide(&ctx, dt);

        self.vehicle.apply_intent(&intent);
        self.vehicle.update(dt);

        let collided = track.check_collision(self.vehicle.position, self.vehicle.width / 2.0);
        if collided {
            self.vehicle.handle_collision();
        }

        let advance = self
            .progress
            .update(self.vehicle.position, track.checkpoints());
        if advance.is_some_and(|a| a.lap_completed) {
            self.policy.on_lap_completed();
        }

        (advance, collided)
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        self.vehicle.snapshot().with_progress(&self.progress)
    }
}

fn pose_of(vehicle: &Vehicle) -> Pose {
    Pose {
        position: vehicle.position,
        angle: vehicle.angle,
    }
}

/// Complete race state
#[derive(Debug, Clone)]
pub struct Race {
    /// Race configuration
    pub config: RaceConfig,
    /// Current race status
    pub status: RaceStatus,
    pub track: Track,
    /// Shared by every opponent; static per track
    pub racing_line: RacingLine,
    pub player: PlayerCar,
    pub opponents: Vec<Opponent>,
    /// Elapsed race time (seconds, from the green light)
    pub elapsed_time: f32,
    /// Countdown remaining (seconds)
    pub countdown: f32,
    /// Finish order, only filled when the race has a lap limit
    pub finish_order: Vec<RaceResult>,
    events: EventQueue,
    policy_swaps: u64,
}

impl Race {
    /// Undrained events kept at most; older ones are discarded
    pub const EVENT_CAPACITY: usize = 256;

    /// Build the track, grid and opponents described by `config`
    pub fn new(config: RaceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let track = config.track.build()?;
        let racing_line = RacingLine::build(track.checkpoints());
        let checkpoint_count = track.checkpoints().len();

        // The grid sits on the finish line, so checkpoint 0 is already taken
        let grid_progress = || {
            let mut progress = CheckpointProgress::new(checkpoint_count);
            progress.record_crossing(0);
            progress
        };

        let player_vehicle = Vehicle::new(
            PLAYER_ID,
            config.player_name.clone(),
            config.player_color.clone(),
            &config.player,
            track.start_position(),
            track.start_angle(),
        );
        let player = PlayerCar::new(player_vehicle, grid_progress());

        let slots = grid_slots(&track, &config)?;
        let opponents = config
            .opponents
            .iter()
            .zip(slots)
            .enumerate()
            .map(|(index, (opponent, slot))| {
                let vehicle = Vehicle::new(
                    index as u32 + 1,
                    opponent.name.clone(),
                    opponent.color.clone(),
                    &opponent.vehicle,
                    slot,
                    track.start_angle(),
                );
                Opponent {
                    vehicle,
                    policy: SteeringPolicy::new(
                        opponent.policy,
                        opponent.difficulty,
                        opponent_seed(config.seed, index, 0),
                    ),
                    progress: grid_progress(),
                    timer: LapTimer::default(),
                    sensors: Vec::new(),
                    difficulty: opponent.difficulty,
                }
            })
            .collect();

        Ok(Self {
            countdown: config.countdown,
            config,
            status: RaceStatus::NotStarted,
            track,
            racing_line,
            player,
            opponents,
            elapsed_time: 0.0,
            finish_order: Vec::new(),
            events: EventQueue::default(),
            policy_swaps: 0,
        })
    }

    /// Start countdown
    pub fn start_countdown(&mut self) {
        self.status = RaceStatus::Countdown;
        self.countdown = self.config.countdown;
    }

    /// Update race state
    pub fn update(&mut self, delta: f32, input: PlayerInput) {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };

        match self.status {
            RaceStatus::NotStarted => {}

            RaceStatus::Countdown => {
                self.countdown -= delta;
                if self.countdown <= 0.0 {
                    self.status = RaceStatus::Racing;
                    self.countdown = 0.0;
                    log::info!("Race is green");
                }
            }

            RaceStatus::Racing => {
                self.elapsed_time += delta;
                self.update_player(input, delta);
                self.update_opponents(delta);
            }

            RaceStatus::Finished => {
                // Cars coast to a stop
                self.player.vehicle.release_accelerator(delta);
                self.player.vehicle.update(delta);
                for opponent in &mut self.opponents {
                    opponent.vehicle.release_accelerator(delta);
                    opponent.vehicle.update(delta);
                }
            }
        }
    }

    fn update_player(&mut self, input: PlayerInput, dt: f32) {
        let player = &mut self.player;

        player.vehicle.apply_intent(&input.to_intent(dt));
        player.update_boost(input.boost, dt);
        player.vehicle.update(dt);

        if player.vehicle.drifting {
            player.drift_distance += player.vehicle.speed() * dt;
        }

        player.sensors = self
            .config
            .player_sensors
            .cast(pose_of(&player.vehicle), self.track.barriers());
        let closest = player.sensors.iter().copied().fold(f32::INFINITY, f32::min);
        if closest < self.config.player_collision_distance {
            player.vehicle.handle_collision();
            self.events.push(RaceEvent::Collision {
                vehicle_id: PLAYER_ID,
            });
        }

        let advance = self
            .track
            .check_checkpoint(player.vehicle.position)
            .and_then(|hit| player.progress.record_crossing(hit.index));
        if let Some(advance) = advance {
            let name = player.vehicle.name.clone();
            self.record_advance(PLAYER_ID, &name, advance);
        }
    }

    fn update_opponents(&mut self, dt: f32) {
        let player = self.player.snapshot();

        for index in 0..self.opponents.len() {
            let opponent = &mut self.opponents[index];
            let (advance, collided) = opponent.drive(&self.track, &self.racing_line, &player, dt);
            let vehicle_id = opponent.vehicle.id;
            let name = opponent.vehicle.name.clone();

            if collided {
                self.events.push(RaceEvent::Collision { vehicle_id });
            }
            if let Some(advance) = advance {
                self.record_advance(vehicle_id, &name, advance);
            }
        }
    }

    fn timer_mut(&mut self, vehicle_id: u32) -> Option<&mut LapTimer> {
        if vehicle_id == PLAYER_ID {
            Some(&mut self.player.timer)
        } else {
            self.opponents
                .get_mut(vehicle_id as usize - 1)
                .map(|o| &mut o.timer)
        }
    }

    /// Turn a checkpoint advance into events, lap times and finishes
    fn record_advance(&mut self, vehicle_id: u32, name: &str, advance: CheckpointAdvance) {
        self.events.push(RaceEvent::CheckpointCrossed {
            vehicle_id,
            checkpoint: advance.crossed,
            kind: CheckpointKind::for_index(advance.crossed),
        });

        if !advance.lap_completed {
            return;
        }

        let elapsed = self.elapsed_time;
        let Some((lap_time, is_best)) = self.timer_mut(vehicle_id).map(|t| t.complete(elapsed))
        else {
            return;
        };
        log::debug!("{name} completed lap {} in {lap_time:.2}s", advance.laps);
        self.events.push(RaceEvent::LapCompleted {
            vehicle_id,
            lap: advance.laps,
            lap_time,
        });
        if is_best {
            self.events.push(RaceEvent::BestLap {
                vehicle_id,
                lap_time,
            });
        }

        let Some(limit) = self.config.laps else {
            return;
        };
        if advance.laps < limit || self.finish_order.iter().any(|r| r.vehicle_id == vehicle_id) {
            return;
        }

        self.finish_order.push(RaceResult {
            vehicle_id,
            name: name.to_string(),
            finish_time: elapsed,
            position: self.finish_order.len() as u32 + 1,
        });

        // The session ends with the human driver
        if vehicle_id == PLAYER_ID {
            self.status = RaceStatus::Finished;
            let winner_id = self.finish_order[0].vehicle_id;
            log::info!("Race finished in {elapsed:.2}s, winner {winner_id}");
            self.events.push(RaceEvent::RaceFinished { winner_id });
        }
    }

    /// Replace an opponent's policy, keeping its car where it is
    pub fn set_policy(&mut self, index: usize, kind: PolicyKind) -> Option<PolicyKind> {
        if index >= self.opponents.len() {
            return None;
        }
        self.policy_swaps += 1;
        let seed = opponent_seed(self.config.seed, index, self.policy_swaps);
        let opponent = &mut self.opponents[index];

        opponent.policy = SteeringPolicy::new(kind, opponent.difficulty, seed);
        // The adaptive policy owns the top speed; others drive the configured car
        if let Some(config) = self.config.opponents.get(index) {
            opponent.vehicle.max_velocity = config.vehicle.max_velocity;
        }

        log::info!("{} switched to {}", opponent.vehicle.name, kind.as_str());
        self.events.push(RaceEvent::PolicyChanged {
            vehicle_id: opponent.vehicle.id,
            policy: kind,
        });
        Some(kind)
    }

    /// Flip an opponent between basic and enhanced AI
    pub fn toggle_ai_type(&mut self, index: usize) -> Option<PolicyKind> {
        let kind = self.opponents.get(index)?.policy.kind().toggled();
        self.set_policy(index, kind)
    }

    /// Take every event queued since the last drain
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        self.events.drain()
    }

    pub fn racing_line(&self) -> &[Point] {
        self.racing_line.waypoints()
    }

    /// Get compact snapshot for IPC transfer
    pub fn get_snapshot(&self) -> RaceSnapshot {
        RaceSnapshot::from(self)
    }
}

/// Starting spots for every opponent, two abreast
///
/// The first pair sits beside the player; later rows fall back along the
/// checkpoint loop against the direction of travel. Spots whose footprint
/// touches a barrier are skipped.
fn grid_slots(track: &Track, config: &RaceConfig) -> Result<Vec<Point>, ConfigError> {
    let count = config.opponents.len();
    let (width, length) = config
        .opponents
        .iter()
        .fold((0.0_f32, 0.0_f32), |(w, l), o| {
            (w.max(o.vehicle.width), l.max(o.vehicle.height))
        });
    let half_width = width / 2.0;
    let lateral = config
        .grid_spacing
        .min((track.track_width() / 2.0 - half_width - Track::BARRIER_MARGIN).max(0.0));
    let row_gap = config.grid_spacing.max(length);

    let mut slots: Vec<Point> = Vec::with_capacity(count);
    let mut row = 0;
    while slots.len() < count {
        let Some((centre, (right_x, right_y))) = point_behind_start(track, row as f32 * row_gap)
        else {
            return Err(ConfigError::Invalid(format!(
                "no room on the grid for {count} opponents"
            )));
        };
        for side in [1.0, -1.0] {
            let slot = Point::new(
                centre.x + right_x * lateral * side,
                centre.y + right_y * lateral * side,
            );
            if slots.len() < count
                && !slots.contains(&slot)
                && !track.check_collision(slot, half_width)
            {
                slots.push(slot);
            }
        }
        row += 1;
    }
    Ok(slots)
}

/// Point `distance` back along the checkpoint loop from the start, with the
/// unit vector to the right of the direction of travel there
fn point_behind_start(track: &Track, distance: f32) -> Option<(Point, (f32, f32))> {
    let mut ahead = track.start_position();
    let mut remaining = distance;

    for &behind in track.checkpoints().iter().rev() {
        let length = ahead.distance_to(behind);
        if length > f32::EPSILON {
            let dx = (ahead.x - behind.x) / length;
            let dy = (ahead.y - behind.y) / length;
            if remaining <= length {
                return Some((ahead.lerp(behind, remaining / length), (-dy, dx)));
            }
            remaining -= length;
        }
        ahead = behind;
    }
    None
}

fn opponent_seed(seed: u64, index: usize, generation: u64) -> u64 {
    seed.wrapping_add(index as u64 + 1)
        .wrapping_add(generation.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// The player car as the UI sees it
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub vehicle: VehicleSnapshot,
    pub sensors: Vec<f32>,
    pub sensor_config: SensorConfig,
    pub boost_meter: f32,
    pub boost_time: f32,
    pub drift_distance: f32,
    pub current_lap_time: f32,
    pub best_lap_time: Option<f32>,
}

/// One opponent as the UI sees it
#[derive(Debug, Clone, Serialize)]
pub struct OpponentSnapshot {
    pub vehicle: VehicleSnapshot,
    pub policy: PolicyKind,
    pub policy_name: &'static str,
    pub sensors: Vec<f32>,
    pub sensor_config: Option<SensorConfig>,
    pub skill_level: Option<f32>,
    pub current_lap_time: f32,
    pub best_lap_time: Option<f32>,
}

/// Compact race snapshot for IPC transfer
#[derive(Debug, Clone, Serialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub elapsed_time: f32,
    pub countdown: f32,
    pub laps: Option<u32>,
    pub player: PlayerSnapshot,
    pub opponents: Vec<OpponentSnapshot>,
    pub finish_order: Vec<RaceResult>,
}

impl From<&Race> for RaceSnapshot {
    fn from(race: &Race) -> Self {
        let elapsed = race.elapsed_time;
        let player = &race.player;

        Self {
            status: race.status,
            elapsed_time: elapsed,
            countdown: race.countdown,
            laps: race.config.laps,
            player: PlayerSnapshot {
                vehicle: player.snapshot(),
                sensors: player.sensors.clone(),
                sensor_config: race.config.player_sensors,
                boost_meter: player.boost_meter,
                boost_time: player.boost_time,
                drift_distance: player.drift_distance,
                current_lap_time: player.timer.current(elapsed),
                best_lap_time: player.timer.best(),
            },
            opponents: race
                .opponents
                .iter()
                .map(|o| OpponentSnapshot {
                    vehicle: o.snapshot(),
                    policy: o.policy.kind(),
                    policy_name: o.policy.kind().as_str(),
                    sensors: o.sensors.clone(),
                    sensor_config: o.policy.sensor_config(),
                    skill_level: o.policy.skill_level(),
                    current_lap_time: o.timer.current(elapsed),
                    best_lap_time: o.timer.best(),
                })
                .collect(),
            finish_order: race.finish_order.clone(),
        }
    }
}
