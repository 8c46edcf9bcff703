//! Progress - Target checkpoint and lap counting for one vehicle
//!
//! A vehicle chases one checkpoint at a time. Reaching it advances the target
//! cyclically; wrapping back to index 0 completes a lap.

use serde::{Deserialize, Serialize};

use crate::game_server::geometry::Point;
use crate::game_server::track::Track;

/// Outcome of reaching the current target checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointAdvance {
    /// Checkpoint that was just reached
    pub crossed: usize,
    /// New target checkpoint
    pub next_target: usize,
    pub lap_completed: bool,
    /// Lap count after this advance
    pub laps: u32,
}

/// Per-vehicle checkpoint state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointProgress {
    checkpoint_count: usize,
    target_checkpoint: usize,
    last_checkpoint: Option<usize>,
    laps: u32,
}

impl CheckpointProgress {
    /// Start chasing checkpoint 0 on a track with `checkpoint_count` checkpoints
    pub fn new(checkpoint_count: usize) -> Self {
        Self {
            checkpoint_count: checkpoint_count.max(1),
            target_checkpoint: 0,
            last_checkpoint: None,
            laps: 0,
        }
    }

    pub fn target_checkpoint(&self) -> usize {
        self.target_checkpoint
    }

    pub fn last_checkpoint(&self) -> Option<usize> {
        self.last_checkpoint
    }

    pub fn laps(&self) -> u32 {
        self.laps
    }

    /// Distance from `position` to the current target
    pub fn distance_to_target(&self, position: Point, checkpoints: &[Point]) -> f32 {
        checkpoints
            .get(self.target_checkpoint)
            .map_or(f32::INFINITY, |c| c.distance_to(position))
    }

    /// Advance when `position` is inside the target's capture radius
    pub fn update(&mut self, position: Point, checkpoints: &[Point]) -> Option<CheckpointAdvance> {
        if self.distance_to_target(position, checkpoints) < Track::CHECKPOINT_RADIUS {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Advance when an externally detected crossing matches the target
    ///
    /// Crossings of any other checkpoint are ignored, so lingering inside a
    /// capture radius cannot count twice.
    pub fn record_crossing(&mut self, index: usize) -> Option<CheckpointAdvance> {
        (index == self.target_checkpoint).then(|| self.advance())
    }

    fn advance(&mut self) -> CheckpointAdvance {
        let crossed = self.target_checkpoint;
        self.last_checkpoint = Some(crossed);
        self.target_checkpoint = (crossed + 1) % self.checkpoint_count;

        let lap_completed = self.target_checkpoint == 0;
        if lap_completed {
            self.laps += 1;
        }

        CheckpointAdvance {
            crossed,
            next_target: self.target_checkpoint,
            lap_completed,
            laps: self.laps,
        }
    }
}
