//! Vehicle - Car state and the shared physics model
//!
//! Player and AI cars use the same integrator. Control operations take the
//! duration the control was held and saturate against physical bounds; none
//! of them can fail.

use serde::{Deserialize, Serialize};

use crate::game_server::geometry::Point;
use crate::game_server::progress::CheckpointProgress;

/// Tunable handling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleParams {
    pub max_velocity: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    /// Radians per second at full steering authority
    pub turn_speed: f32,
    pub boost_multiplier: f32,
    /// Per-tick velocity decay factor
    pub friction: f32,
    /// Fraction of top speed above which accelerating engages a drift
    pub auto_drift_threshold: Option<f32>,
    pub width: f32,
    pub height: f32,
}

impl VehicleParams {
    /// Player handling in race mode
    pub fn player() -> Self {
        Self {
            max_velocity: 450.0,
            ..Self::default()
        }
    }

    /// AI handling, slightly slower than the base car
    pub fn opponent() -> Self {
        Self {
            max_velocity: 280.0,
            ..Self::default()
        }
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self {
            max_velocity: 300.0,
            acceleration: 150.0,
            deceleration: 80.0,
            turn_speed: 2.5,
            boost_multiplier: 1.5,
            friction: 0.98,
            auto_drift_threshold: Some(0.7),
            width: 30.0,
            height: 50.0,
        }
    }
}

/// A fading skid mark left while drifting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftPoint {
    pub position: Point,
    pub opacity: f32,
}

/// Steering input for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Steer {
    #[default]
    Straight,
    Left,
    Right,
}

/// Pedal input for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Throttle {
    /// No pedal action at all, physics only
    #[default]
    Hold,
    Accelerate,
    Brake,
    /// Foot off the pedals: natural drag toward rest
    Release,
}

/// Control actions to apply to a vehicle before it integrates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlIntent {
    pub steer: Steer,
    /// Seconds of steering authority
    pub steer_dt: f32,
    pub throttle: Throttle,
    /// Seconds the pedal action is held
    pub throttle_dt: f32,
    /// Forces the drift flag after the throttle is applied
    pub drift: Option<bool>,
    /// `Some(true)` engages boost, `Some(false)` disengages, `None` leaves it
    pub boost: Option<bool>,
}

impl ControlIntent {
    /// Intent that applies no controls this tick
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Raw player intents as captured by the input layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerInput {
    pub accelerate: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
    pub boost: bool,
}

/// Any car on the circuit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub position: Point,
    /// Chassis heading, 0 = north
    pub angle: f32,
    /// Signed velocity; negative is reverse
    pub velocity: f32,
    pub max_velocity: f32,
    pub acceleration: f32,
    pub deceleration: f32,
    pub turn_speed: f32,
    pub friction: f32,
    pub auto_drift_threshold: Option<f32>,
    pub boost: bool,
    pub boost_multiplier: f32,
    pub drifting: bool,
    /// Drift blend in `[0, DRIFT_FACTOR_MAX]`
    pub drift_factor: f32,
    pub drift_trail: Vec<DriftPoint>,
    pub width: f32,
    pub height: f32,
}

impl Vehicle {
    const DRIFT_GROWTH_RATE: f32 = 2.0;
    const DRIFT_DECAY_RATE: f32 = 3.0;
    pub const DRIFT_FACTOR_MAX: f32 = 0.8;
    const DRIFT_ANGLE_SCALE: f32 = 0.6;
    const DRIFT_TURN_SCALE: f32 = 0.7;
    const TRAIL_MIN_SPEED: f32 = 50.0;
    pub const TRAIL_CAPACITY: usize = 20;
    const TRAIL_START_OPACITY: f32 = 0.7;
    const TRAIL_FADE_RATE: f32 = 1.5;
    const RESTITUTION: f32 = 0.5;

    /// Create a stationary car at a starting pose
    pub fn new(
        id: u32,
        name: impl Into<String>,
        color: impl Into<String>,
        params: &VehicleParams,
        position: Point,
        angle: f32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            position,
            angle,
            velocity: 0.0,
            max_velocity: params.max_velocity,
            acceleration: params.acceleration,
            deceleration: params.deceleration,
            turn_speed: params.turn_speed,
            friction: params.friction,
            auto_drift_threshold: params.auto_drift_threshold,
            boost: false,
            boost_multiplier: params.boost_multiplier,
            drifting: false,
            drift_factor: 0.0,
            drift_trail: Vec::new(),
            width: params.width,
            height: params.height,
        }
    }

    /// Absolute speed
    pub fn speed(&self) -> f32 {
        self.velocity.abs()
    }

    fn boost_scale(&self) -> f32 {
        if self.boost {
            self.boost_multiplier
        } else {
            1.0
        }
    }

    /// Current forward speed ceiling, boost included
    pub fn speed_cap(&self) -> f32 {
        self.max_velocity * self.boost_scale()
    }

    /// Integrate one physics tick
    pub fn update(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.velocity *= self.friction;

        if self.drifting {
            self.drift_factor =
                (self.drift_factor + dt * Self::DRIFT_GROWTH_RATE).min(Self::DRIFT_FACTOR_MAX);

            if self.speed() > Self::TRAIL_MIN_SPEED {
                self.drift_trail.push(DriftPoint {
                    position: self.position,
                    opacity: Self::TRAIL_START_OPACITY,
                });
                if self.drift_trail.len() > Self::TRAIL_CAPACITY {
                    self.drift_trail.remove(0);
                }
            }
        } else {
            self.drift_factor = (self.drift_factor - dt * Self::DRIFT_DECAY_RATE).max(0.0);
        }

        for point in &mut self.drift_trail {
            point.opacity -= dt * Self::TRAIL_FADE_RATE;
        }
        self.drift_trail.retain(|p| p.opacity > 0.0);

        // Drift swings the movement vector, not the chassis
        let direction = if self.velocity > 0.0 {
            1.0
        } else if self.velocity < 0.0 {
            -1.0
        } else {
            0.0
        };
        let effective_angle = self.angle + self.drift_factor * direction * Self::DRIFT_ANGLE_SCALE;

        self.position.x += effective_angle.sin() * self.velocity * dt;
        self.position.y -= effective_angle.cos() * self.velocity * dt;
    }

    /// Speed `accelerate(dt)` would leave the car at
    pub fn speed_after_accelerate(&self, dt: f32) -> f32 {
        let rate = self.acceleration * self.boost_scale();
        (self.velocity + rate * dt.max(0.0)).min(self.speed_cap()).abs()
    }

    /// Throttle toward the (boosted) top speed
    pub fn accelerate(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        let rate = self.acceleration * self.boost_scale();
        self.velocity = (self.velocity + rate * dt).min(self.speed_cap());

        if let Some(threshold) = self.auto_drift_threshold {
            if self.speed() > self.max_velocity * threshold {
                self.drifting = true;
            }
        }
    }

    /// Hard braking down to rest, then reversing up to half top speed
    pub fn brake(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        if self.velocity > 0.0 {
            self.velocity = (self.velocity - self.deceleration * 2.0 * dt).max(0.0);
        } else {
            self.velocity =
                (self.velocity - self.acceleration * 0.5 * dt).max(-self.max_velocity / 2.0);
        }

        if self.speed() < self.max_velocity * 0.4 {
            self.drifting = false;
        }
    }

    /// Natural drag toward rest from either direction
    pub fn release_accelerator(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        if self.velocity > 0.0 {
            self.velocity = (self.velocity - self.deceleration * dt).max(0.0);
        } else if self.velocity < 0.0 {
            self.velocity = (self.velocity + self.deceleration * dt).min(0.0);
        }

        if self.speed() < self.max_velocity * 0.5 {
            self.drifting = false;
        }
    }

    fn turn_amount(&self, dt: f32) -> f32 {
        let drift_scale = if self.drifting {
            Self::DRIFT_TURN_SCALE
        } else {
            1.0
        };
        let velocity_factor = self.speed() / (self.max_velocity * 0.8);
        self.turn_speed * drift_scale * dt.max(0.0) * velocity_factor.min(1.0)
    }

    pub fn turn_left(&mut self, dt: f32) {
        self.angle -= self.turn_amount(dt);
    }

    pub fn turn_right(&mut self, dt: f32) {
        self.angle += self.turn_amount(dt);
    }

    /// Damped rebound off a barrier
    pub fn handle_collision(&mut self) {
        self.velocity = -self.velocity * Self::RESTITUTION;
        self.drifting = false;
        self.drift_factor = 0.0;
    }

    pub fn activate_boost(&mut self) {
        self.boost = true;
    }

    pub fn deactivate_boost(&mut self) {
        self.boost = false;
    }

    /// Apply a control intent (steer, pedals, drift override, boost)
    pub fn apply_intent(&mut self, intent: &ControlIntent) {
        match intent.steer {
            Steer::Left => self.turn_left(intent.steer_dt),
            Steer::Right => self.turn_right(intent.steer_dt),
            Steer::Straight => {}
        }

        let dt = intent.throttle_dt;
        match intent.throttle {
            Throttle::Accelerate => self.accelerate(dt),
            Throttle::Brake => self.brake(dt),
            Throttle::Release => self.release_accelerator(dt),
            Throttle::Hold => {}
        }

        if let Some(drifting) = intent.drift {
            self.drifting = drifting;
        }

        match intent.boost {
            Some(true) => self.activate_boost(),
            Some(false) => self.deactivate_boost(),
            None => {}
        }
    }

    /// Read-only view for other cars and the UI layer
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot::from(self)
    }
}

impl PlayerInput {
    /// Translate held keys into an intent for `dt` seconds
    ///
    /// Boost is decided by the race, which owns the boost meter.
    pub fn to_intent(self, dt: f32) -> ControlIntent {
        let throttle = if self.accelerate {
            Throttle::Accelerate
        } else if self.brake {
            Throttle::Brake
        } else {
            Throttle::Release
        };

        // Opposite keys cancel out
        let steer = match (self.left, self.right) {
            (true, false) => Steer::Left,
            (false, true) => Steer::Right,
            _ => Steer::Straight,
        };

        ControlIntent {
            steer,
            steer_dt: dt,
            throttle,
            throttle_dt: dt,
            drift: None,
            boost: None,
        }
    }
}

/// Value snapshot of a vehicle, safe to hand to other cars and the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: u32,
    pub name: String,
    pub color: String,
    pub position: Point,
    pub angle: f32,
    pub velocity: f32,
    pub speed: f32,
    pub drifting: bool,
    pub boost: bool,
    pub drift_trail: Vec<DriftPoint>,
    pub target_checkpoint: usize,
    pub lap: u32,
}

impl VehicleSnapshot {
    /// Attach checkpoint progress to the snapshot
    pub fn with_progress(mut self, progress: &CheckpointProgress) -> Self {
        self.target_checkpoint = progress.target_checkpoint();
        self.lap = progress.laps();
        self
    }
}

impl From<&Vehicle> for VehicleSnapshot {
    fn from(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id,
            name: vehicle.name.clone(),
            color: vehicle.color.clone(),
            position: vehicle.position,
            angle: vehicle.angle,
            velocity: vehicle.velocity,
            speed: vehicle.speed(),
            drifting: vehicle.drifting,
            boost: vehicle.boost,
            drift_trail: vehicle.drift_trail.clone(),
            target_checkpoint: 0,
            lap: 0,
        }
    }
}
