//! Track - Checkpoint circuit and barrier queries
//!
//! The track is immutable once built. Barriers are derived by offsetting each
//! checkpoint-to-checkpoint leg by half the track width on both sides.

use serde::Serialize;
use std::f32::consts::PI;
use thiserror::Error;

use crate::game_server::geometry::{distance_point_to_segment, Point, Segment};

/// Reasons a track layout is rejected at construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("track needs at least 3 checkpoints, got {0}")]
    TooFewCheckpoints(usize),
    #[error("track extents must be positive, got {width}x{height}")]
    InvalidExtent { width: f32, height: f32 },
    #[error("track width must be positive, got {0}")]
    InvalidTrackWidth(f32),
    #[error("checkpoint {0} has a non-finite coordinate")]
    NonFiniteCheckpoint(usize),
    #[error("checkpoints {0} and {1} coincide")]
    CoincidentCheckpoints(usize, usize),
}

/// What kind of checkpoint a vehicle is touching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    /// Checkpoint 0, which doubles as the finish line
    Finish,
    Checkpoint,
}

impl CheckpointKind {
    pub fn for_index(index: usize) -> Self {
        if index == 0 {
            CheckpointKind::Finish
        } else {
            CheckpointKind::Checkpoint
        }
    }
}

/// Result of a checkpoint proximity test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointHit {
    pub index: usize,
    pub kind: CheckpointKind,
}

/// Closed-loop circuit
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    width: f32,
    height: f32,
    track_width: f32,
    checkpoints: Vec<Point>,
    barriers: Vec<Segment>,
    start_position: Point,
    start_angle: f32,
}

impl Track {
    /// Capture radius around each checkpoint
    pub const CHECKPOINT_RADIUS: f32 = 50.0;
    /// Points closer than this to a barrier count as off-track
    pub const BARRIER_MARGIN: f32 = 10.0;

    /// Build a track from an ordered, cyclic checkpoint list
    pub fn new(
        width: f32,
        height: f32,
        track_width: f32,
        checkpoints: Vec<Point>,
        start_position: Point,
        start_angle: f32,
    ) -> Result<Self, TrackError> {
        if !(width > 0.0 && height > 0.0) {
            return Err(TrackError::InvalidExtent { width, height });
        }
        if !(track_width > 0.0) {
            return Err(TrackError::InvalidTrackWidth(track_width));
        }
        if checkpoints.len() < 3 {
            return Err(TrackError::TooFewCheckpoints(checkpoints.len()));
        }
        if let Some(i) = checkpoints
            .iter()
            .position(|c| !c.x.is_finite() || !c.y.is_finite())
        {
            return Err(TrackError::NonFiniteCheckpoint(i));
        }
        for i in 0..checkpoints.len() {
            let next = (i + 1) % checkpoints.len();
            if checkpoints[i].distance_to(checkpoints[next]) == 0.0 {
                return Err(TrackError::CoincidentCheckpoints(i, next));
            }
        }

        let barriers = Self::offset_barriers(&checkpoints, track_width / 2.0);

        Ok(Self {
            width,
            height,
            track_width,
            checkpoints,
            barriers,
            start_position,
            start_angle,
        })
    }

    /// Standard seven-checkpoint circuit centred in a `width` x `height` area
    pub fn circuit(width: f32, height: f32, track_width: f32) -> Result<Self, TrackError> {
        let cx = width / 2.0;
        let cy = height / 2.0;
        let radius = 400.0;

        let checkpoints = vec![
            // Start/finish
            Point::new(cx, cy + radius / 2.0),
            Point::new(cx - radius / 3.0, cy),
            Point::new(cx - radius, cy - radius / 3.0),
            Point::new(cx - radius / 2.0, cy - radius),
            Point::new(cx + radius / 2.0, cy - radius / 2.0),
            Point::new(cx + radius, cy),
            Point::new(cx + radius / 2.0, cy + radius / 3.0),
        ];

        Self::new(
            width,
            height,
            track_width,
            checkpoints,
            Point::new(cx, cy + 200.0),
            -PI / 2.0,
        )
    }

    fn offset_barriers(checkpoints: &[Point], offset: f32) -> Vec<Segment> {
        let mut barriers = Vec::with_capacity(checkpoints.len() * 2);

        for (i, &current) in checkpoints.iter().enumerate() {
            let next = checkpoints[(i + 1) % checkpoints.len()];
            let length = current.distance_to(next);
            let nx = (next.x - current.x) / length;
            let ny = (next.y - current.y) / length;
            // Perpendicular
            let px = -ny * offset;
            let py = nx * offset;

            barriers.push(Segment::new(
                Point::new(current.x + px, current.y + py),
                Point::new(next.x + px, next.y + py),
            ));
            barriers.push(Segment::new(
                Point::new(current.x - px, current.y - py),
                Point::new(next.x - px, next.y - py),
            ));
        }

        barriers
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn track_width(&self) -> f32 {
        self.track_width
    }

    pub fn checkpoints(&self) -> &[Point] {
        &self.checkpoints
    }

    /// Checkpoint at a cyclic index
    pub fn checkpoint(&self, index: usize) -> Point {
        self.checkpoints[index % self.checkpoints.len()]
    }

    pub fn barriers(&self) -> &[Segment] {
        &self.barriers
    }

    pub fn start_position(&self) -> Point {
        self.start_position
    }

    pub fn start_angle(&self) -> f32 {
        self.start_angle
    }

    /// True near any barrier or outside the rectangular extent
    pub fn is_point_out_of_bounds(&self, point: Point) -> bool {
        if self.near_barrier(point, Self::BARRIER_MARGIN) {
            return true;
        }

        point.x < 0.0 || point.x > self.width || point.y < 0.0 || point.y > self.height
    }

    /// True when a footprint of `half_width` touches a barrier or leaves the track area
    pub fn check_collision(&self, position: Point, half_width: f32) -> bool {
        self.near_barrier(position, half_width) || self.is_point_out_of_bounds(position)
    }

    /// First checkpoint within the capture radius, in index order
    pub fn check_checkpoint(&self, position: Point) -> Option<CheckpointHit> {
        self.checkpoints
            .iter()
            .position(|c| c.distance_to(position) < Self::CHECKPOINT_RADIUS)
            .map(|index| CheckpointHit {
                index,
                kind: CheckpointKind::for_index(index),
            })
    }

    fn near_barrier(&self, point: Point, distance: f32) -> bool {
        self.barriers
            .iter()
            .any(|b| distance_point_to_segment(point, b.start(), b.end()) < distance)
    }
}
