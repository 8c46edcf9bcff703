//! Simulation - Main game server and loop
//!
//! Manages the game server state, handles tick updates, and
//! provides the interface for Tauri commands.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Instant;
use thiserror::Error;

use crate::game_server::ai::PolicyKind;
use crate::game_server::config::{ConfigError, RaceConfig};
use crate::game_server::geometry::Point;
use crate::game_server::race::{Race, RaceEvent, RaceResult, RaceSnapshot, RaceStatus};
use crate::game_server::vehicle::PlayerInput;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("no race has been initialised")]
    NoRace,
    #[error("no opponent at index {0}")]
    UnknownOpponent(usize),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Game state for the local AI mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameState {
    Idle,
    Loading,
    Ready,
    Racing,
    Results,
}

/// Server statistics
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub tick_rate: f32,
    pub avg_tick_time_ms: f32,
    pub vehicle_count: u32,
    pub game_state: GameState,
}

/// Main game server
pub struct GameServer {
    /// Current game state
    state: GameState,
    /// Active race (if any)
    race: Option<Race>,
    /// Target tick rate (ticks per second)
    tick_rate: f32,
    /// Last tick timestamp
    last_tick: Instant,
    /// Recent tick durations for averaging
    tick_times: VecDeque<f32>,
    /// Whether the server is running
    running: bool,
}

impl GameServer {
    const TICK_WINDOW: usize = 60;

    /// Create a new game server
    pub fn new() -> Self {
        Self {
            state: GameState::Idle,
            race: None,
            tick_rate: 60.0,
            last_tick: Instant::now(),
            tick_times: VecDeque::with_capacity(Self::TICK_WINDOW),
            running: false,
        }
    }

    /// Initialize a new race with given config
    pub fn init_race(&mut self, config: RaceConfig) -> Result<(), ServerError> {
        self.state = GameState::Loading;
        self.running = false;

        let race = match Race::new(config) {
            Ok(race) => race,
            Err(e) => {
                log::warn!("Rejected race config: {e}");
                self.state = if self.race.is_some() {
                    GameState::Ready
                } else {
                    GameState::Idle
                };
                return Err(e.into());
            }
        };

        log::info!(
            "Race initialized with {} opponents on a {}x{} track",
            race.opponents.len(),
            race.track.width(),
            race.track.height()
        );
        self.race = Some(race);
        self.state = GameState::Ready;
        Ok(())
    }

    /// Start the race countdown
    pub fn start_race(&mut self) -> Result<(), ServerError> {
        let race = self.race.as_mut().ok_or(ServerError::NoRace)?;
        race.start_countdown();
        self.state = GameState::Racing;
        self.running = true;
        self.last_tick = Instant::now();
        log::info!("Race started");
        Ok(())
    }

    /// Perform a single simulation tick using wall-clock time since the last one
    pub fn tick(&mut self, input: PlayerInput) -> Option<RaceSnapshot> {
        let now = Instant::now();
        let delta = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;
        self.tick_with_delta(delta, input)
    }

    /// Perform a single simulation tick of `delta` seconds
    ///
    /// The delta is clamped to the race's `max_delta`, so a stalled frame
    /// cannot tunnel cars through barriers.
    pub fn tick_with_delta(&mut self, delta: f32, input: PlayerInput) -> Option<RaceSnapshot> {
        if !self.running {
            return self.get_snapshot();
        }

        // Track tick timing
        let tick_start = Instant::now();

        if let Some(race) = &mut self.race {
            let delta = delta.clamp(0.0, race.config.max_delta);
            race.update(delta, input);

            if race.status == RaceStatus::Finished {
                self.state = GameState::Results;
                self.running = false;
            }
        }

        // Record tick time
        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        self.tick_times.push_back(tick_time);
        if self.tick_times.len() > Self::TICK_WINDOW {
            self.tick_times.pop_front();
        }

        self.get_snapshot()
    }

    /// Get current race snapshot
    pub fn get_snapshot(&self) -> Option<RaceSnapshot> {
        self.race.as_ref().map(|r| r.get_snapshot())
    }

    /// Racing-line waypoints for debug overlays
    pub fn get_racing_line(&self) -> Option<Vec<Point>> {
        self.race.as_ref().map(|r| r.racing_line().to_vec())
    }

    /// Get race results
    pub fn get_results(&self) -> Option<Vec<RaceResult>> {
        self.race.as_ref().map(|r| r.finish_order.clone())
    }

    /// Take the events queued since the last call
    pub fn drain_events(&mut self) -> Vec<RaceEvent> {
        self.race
            .as_mut()
            .map(|r| r.drain_events())
            .unwrap_or_default()
    }

    /// Flip opponent `index` between basic and enhanced AI
    pub fn toggle_ai_type(&mut self, index: usize) -> Result<PolicyKind, ServerError> {
        let race = self.race.as_mut().ok_or(ServerError::NoRace)?;
        race.toggle_ai_type(index)
            .ok_or(ServerError::UnknownOpponent(index))
    }

    /// Put opponent `index` under a specific policy
    pub fn set_ai_policy(&mut self, index: usize, kind: PolicyKind) -> Result<(), ServerError> {
        let race = self.race.as_mut().ok_or(ServerError::NoRace)?;
        race.set_policy(index, kind)
            .map(|_| ())
            .ok_or(ServerError::UnknownOpponent(index))
    }

    /// Get server statistics
    pub fn get_stats(&self) -> ServerStats {
        let avg_tick_time = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        ServerStats {
            tick_rate: self.tick_rate,
            avg_tick_time_ms: avg_tick_time,
            vehicle_count: self
                .race
                .as_ref()
                .map(|r| r.opponents.len() as u32 + 1)
                .unwrap_or(0),
            game_state: self.state,
        }
    }

    /// Get current game state
    pub fn get_state(&self) -> GameState {
        self.state
    }

    /// Reset to idle state
    pub fn reset(&mut self) {
        self.state = GameState::Idle;
        self.race = None;
        self.running = false;
        self.tick_times.clear();
        log::info!("Race reset");
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume the simulation
    pub fn resume(&mut self) {
        if self.state == GameState::Racing {
            self.running = true;
            self.last_tick = Instant::now();
        }
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new()
    }
}
