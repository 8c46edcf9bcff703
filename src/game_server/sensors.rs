//! Sensors - Ray fan cast from a vehicle pose against track barriers
//!
//! Cost is O(ray_count x barrier_count) per cast; every sensing vehicle pays it
//! once per tick.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::game_server::geometry::{segment_intersection, Point, Segment};

/// Position and heading a fan is cast from
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub angle: f32,
}

/// Shape of a ray fan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub ray_count: usize,
    pub ray_length: f32,
    /// Total angular spread, centred on the heading (radians)
    pub spread: f32,
}

impl SensorConfig {
    /// Neural opponent fan: 9 rays, 200 units, 0.8 pi
    pub fn opponent() -> Self {
        Self {
            ray_count: 9,
            ray_length: 200.0,
            spread: PI * 0.8,
        }
    }

    /// Player collision fan: 7 rays, 150 units, 0.6 pi
    pub fn player() -> Self {
        Self {
            ray_count: 7,
            ray_length: 150.0,
            spread: PI * 0.6,
        }
    }

    /// Heading of ray `index`, evenly spaced from `-spread/2` to `+spread/2`
    pub fn ray_angle(&self, heading: f32, index: usize) -> f32 {
        if self.ray_count <= 1 {
            return heading;
        }
        heading - self.spread / 2.0 + self.spread * index as f32 / (self.ray_count - 1) as f32
    }

    /// Cast this fan from `pose`
    pub fn cast(&self, pose: Pose, barriers: &[Segment]) -> Vec<f32> {
        cast_rays(pose, barriers, self.ray_count, self.ray_length, self.spread)
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::opponent()
    }
}

/// Hit distance per ray, ordered from the leftmost ray to the rightmost
///
/// Each reading is in `[0, ray_length]`; a ray that crosses no barrier reads
/// exactly `ray_length`.
pub fn cast_rays(
    pose: Pose,
    barriers: &[Segment],
    ray_count: usize,
    ray_length: f32,
    spread: f32,
) -> Vec<f32> {
    let config = SensorConfig {
        ray_count,
        ray_length,
        spread,
    };

    (0..ray_count)
        .map(|i| {
            let angle = config.ray_angle(pose.angle, i);
            let end = pose.position.project(angle, ray_length);

            barriers
                .iter()
                .filter_map(|b| segment_intersection(pose.position, end, b.start(), b.end()))
                .map(|hit| pose.position.distance_to(hit))
                .fold(ray_length, f32::min)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn origin() -> Pose {
        Pose {
            position: Point::new(0.0, 0.0),
            angle: 0.0,
        }
    }

    fn wall_ahead(distance: f32) -> Segment {
        Segment::new(Point::new(-100.0, -distance), Point::new(100.0, -distance))
    }

    #[test]
    fn presets_match_their_fans() {
        let opponent = SensorConfig::opponent();
        assert_eq!(opponent.ray_count, 9);
        assert_eq!(opponent.ray_length, 200.0);
        assert!((opponent.spread - PI * 0.8).abs() < 1e-6);
        assert_eq!(SensorConfig::default(), opponent);

        let player = SensorConfig::player();
        assert_eq!(player.ray_count, 7);
        assert_eq!(player.ray_length, 150.0);
        assert!((player.spread - PI * 0.6).abs() < 1e-6);
    }

    #[test]
    fn head_on_barrier_reads_its_distance() {
        let readings = cast_rays(origin(), &[wall_ahead(50.0)], 1, 150.0, PI * 0.8);
        assert_eq!(readings.len(), 1);
        assert!((readings[0] - 50.0).abs() < EPS);
    }

    #[test]
    fn no_obstruction_reads_full_length() {
        let readings = cast_rays(origin(), &[], 1, 150.0, PI * 0.8);
        assert_eq!(readings, vec![150.0]);

        let far = cast_rays(origin(), &[wall_ahead(400.0)], 5, 150.0, PI * 0.8);
        assert!(far.iter().all(|&d| d == 150.0));
    }

    #[test]
    fn readings_never_exceed_ray_length() {
        let barriers = [
            wall_ahead(60.0),
            Segment::new(Point::new(30.0, 50.0), Point::new(30.0, -50.0)),
            Segment::new(Point::new(-80.0, 50.0), Point::new(-80.0, -50.0)),
        ];
        for angle in [0.0, 0.7, -1.3, 2.9] {
            let pose = Pose {
                position: Point::new(0.0, 0.0),
                angle,
            };
            let readings = cast_rays(pose, &barriers, 9, 120.0, PI * 0.8);
            assert_eq!(readings.len(), 9);
            assert!(readings.iter().all(|&d| (0.0..=120.0).contains(&d)));
        }
    }

    #[test]
    fn nearest_barrier_wins() {
        let readings = cast_rays(origin(), &[wall_ahead(90.0), wall_ahead(40.0)], 1, 150.0, 0.0);
        assert!((readings[0] - 40.0).abs() < EPS);
    }

    #[test]
    fn fan_spans_spread_with_inclusive_endpoints() {
        let config = SensorConfig {
            ray_count: 5,
            ray_length: 100.0,
            spread: PI,
        };
        assert!((config.ray_angle(0.0, 0) + PI / 2.0).abs() < EPS);
        assert!(config.ray_angle(0.0, 2).abs() < EPS);
        assert!((config.ray_angle(0.0, 4) - PI / 2.0).abs() < EPS);

        // Wall on the right only: the rightmost ray sees it, the leftmost does not
        let right_wall = Segment::new(Point::new(30.0, -50.0), Point::new(30.0, 50.0));
        let readings = config.cast(origin(), &[right_wall]);
        assert!((readings[4] - 30.0).abs() < EPS);
        assert_eq!(readings[0], 100.0);
    }
}
