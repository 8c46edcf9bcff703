//! Racing Line - Smoothed target path through the checkpoints
//!
//! Built once per track. Each leg is a quadratic Bezier from a checkpoint to
//! the next, pulled along the outgoing direction, sampled at a fixed count.

use serde::Serialize;

use crate::game_server::geometry::Point;

/// Cyclic waypoint path AI cars steer toward
#[derive(Debug, Clone, Default, Serialize)]
pub struct RacingLine {
    waypoints: Vec<Point>,
}

impl RacingLine {
    /// Samples per leg, endpoints included
    pub const SAMPLES_PER_SEGMENT: usize = 10;
    /// Control-point pull as a fraction of the shorter adjacent leg
    const CONTROL_FRACTION: f32 = 0.3;

    /// Build the line through a cyclic checkpoint sequence
    pub fn build(checkpoints: &[Point]) -> Self {
        Self::build_with_samples(checkpoints, Self::SAMPLES_PER_SEGMENT)
    }

    pub fn build_with_samples(checkpoints: &[Point], samples: usize) -> Self {
        let n = checkpoints.len();
        if n < 2 || samples < 2 {
            return Self {
                waypoints: checkpoints.to_vec(),
            };
        }

        let mut waypoints = Vec::with_capacity(n * (samples - 1) + 1);

        for i in 0..n {
            let prev = checkpoints[(i + n - 1) % n];
            let current = checkpoints[i];
            let next = checkpoints[(i + 1) % n];

            let len_in = prev.distance_to(current);
            let len_out = current.distance_to(next);
            let control = if len_out > 0.0 {
                let pull = len_in.min(len_out) * Self::CONTROL_FRACTION;
                Point::new(
                    current.x + (next.x - current.x) / len_out * pull,
                    current.y + (next.y - current.y) / len_out * pull,
                )
            } else {
                current
            };

            if i == 0 {
                waypoints.push(current);
            }
            // Shared endpoints between legs are kept once
            waypoints.extend((1..samples).map(|s| {
                let t = s as f32 / (samples - 1) as f32;
                quadratic_bezier(current, control, next, t)
            }));
        }

        Self { waypoints }
    }

    pub fn waypoints(&self) -> &[Point] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Index of the waypoint nearest to `position` (linear scan)
    pub fn closest_index(&self, position: Point) -> Option<usize> {
        self.waypoints
            .iter()
            .enumerate()
            .map(|(i, w)| (i, w.distance_to(position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Waypoint nearest to `position`, `None` for an empty line
    pub fn closest_waypoint(&self, position: Point) -> Option<Point> {
        self.closest_index(position).map(|i| self.waypoints[i])
    }

    /// Waypoint `ahead` steps after the one nearest to `position`, wrapping
    pub fn lookahead(&self, position: Point, ahead: usize) -> Option<Point> {
        self.closest_index(position)
            .map(|i| self.waypoints[(i + ahead) % self.waypoints.len()])
    }
}

/// De Casteljau evaluation of a three-point curve
fn quadratic_bezier(p0: Point, p1: Point, p2: Point, t: f32) -> Point {
    let a = p0.lerp(p1, t);
    let b = p1.lerp(p2, t);
    a.lerp(b, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]
    }

    #[test]
    fn one_waypoint_per_sample_plus_the_start() {
        let line = RacingLine::build(&square());
        assert_eq!(line.len(), 4 * (RacingLine::SAMPLES_PER_SEGMENT - 1) + 1);
        assert_eq!(line.waypoints()[0], Point::new(0.0, 0.0));
    }

    #[test]
    fn legs_end_on_the_next_checkpoint() {
        let points = square();
        let line = RacingLine::build(&points);
        let per_leg = RacingLine::SAMPLES_PER_SEGMENT - 1;
        for leg in 0..points.len() {
            let end = line.waypoints()[(leg + 1) * per_leg];
            assert!(end.distance_to(points[(leg + 1) % points.len()]) < 1e-3);
        }
    }

    #[test]
    fn closest_waypoint_is_the_true_minimum() {
        let line = RacingLine::build(&square());
        let query = Point::new(52.0, -7.0);
        let best = line.closest_waypoint(query).expect("non-empty line");
        let min = line
            .waypoints()
            .iter()
            .map(|w| w.distance_to(query))
            .fold(f32::INFINITY, f32::min);
        assert_eq!(best.distance_to(query), min);
    }

    #[test]
    fn empty_line_yields_nothing() {
        let line = RacingLine::build(&[]);
        assert!(line.is_empty());
        assert!(line.closest_waypoint(Point::new(1.0, 1.0)).is_none());
        assert!(line.lookahead(Point::new(1.0, 1.0), 3).is_none());
    }

    #[test]
    fn lookahead_wraps_around_the_loop() {
        let line = RacingLine::build(&square());
        let near_end = line.waypoints()[line.len() - 2];
        let ahead = line.lookahead(near_end, 3).expect("non-empty");
        assert_eq!(ahead, line.waypoints()[1]);
    }
}
