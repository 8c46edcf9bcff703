//! Geometry - Segment intersection, point/segment distance, heading math
//!
//! Heading convention: angle 0 points "north" (negative y), so the forward
//! vector for heading `a` is `(sin(a), -cos(a))`.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A point (or vector) in track space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance_to(self, other: Point) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Point reached by travelling `distance` along heading `angle`
    pub fn project(self, angle: f32, distance: f32) -> Point {
        let (dx, dy) = forward(angle);
        Point::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// Linear interpolation toward `other`
    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(
            (1.0 - t) * self.x + t * other.x,
            (1.0 - t) * self.y + t * other.y,
        )
    }
}

/// A barrier or ray line segment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Segment {
    pub const fn new(a: Point, b: Point) -> Self {
        Self {
            x1: a.x,
            y1: a.y,
            x2: b.x,
            y2: b.y,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn end(&self) -> Point {
        Point::new(self.x2, self.y2)
    }
}

/// Unit forward vector for a heading
pub fn forward(angle: f32) -> (f32, f32) {
    (angle.sin(), -angle.cos())
}

/// Heading that points from `from` toward `to`
pub fn heading_to(from: Point, to: Point) -> f32 {
    (to.x - from.x).atan2(-(to.y - from.y))
}

/// Wrap an angle difference into `(-PI, PI]`
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut wrapped = angle % (2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

/// Intersection point of segments `p1-p2` and `p3-p4`
///
/// Parallel or coincident segments (zero denominator) never intersect, and the
/// crossing must lie within both segments (parameters in `[0, 1]`).
pub fn segment_intersection(p1: Point, p2: Point, p3: Point, p4: Point) -> Option<Point> {
    let denominator = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);
    if denominator == 0.0 {
        return None;
    }

    let ua = ((p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x)) / denominator;
    let ub = ((p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x)) / denominator;

    if !(0.0..=1.0).contains(&ua) || !(0.0..=1.0).contains(&ub) {
        return None;
    }

    Some(p1.lerp(p2, ua))
}

/// Shortest distance from `p` to the segment `a-b`
///
/// A zero-length segment collapses to the distance to `a`.
pub fn distance_point_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let cx = b.x - a.x;
    let cy = b.y - a.y;
    let len_sq = cx * cx + cy * cy;

    let t = if len_sq > 0.0 {
        (((p.x - a.x) * cx + (p.y - a.y) * cy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };

    p.distance_to(Point::new(a.x + t * cx, a.y + t * cy))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn close(a: Point, b: Point) -> bool {
        a.distance_to(b) < EPS
    }

    #[test]
    fn crossing_segments_meet_in_the_middle() {
        let hit = segment_intersection(
            Point::new(-10.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, -10.0),
            Point::new(0.0, 10.0),
        )
        .expect("segments cross");
        assert!(close(hit, Point::new(0.0, 0.0)));
    }

    #[test]
    fn intersection_is_symmetric() {
        let cases = [
            (
                Point::new(0.0, 0.0),
                Point::new(4.0, 4.0),
                Point::new(0.0, 4.0),
                Point::new(4.0, 0.0),
            ),
            (
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(2.0, -1.0),
                Point::new(2.0, 1.0),
            ),
            (
                Point::new(0.0, 0.0),
                Point::new(5.0, 0.0),
                Point::new(0.0, 1.0),
                Point::new(5.0, 1.0),
            ),
        ];

        for (a, b, c, d) in cases {
            match (segment_intersection(a, b, c, d), segment_intersection(c, d, a, b)) {
                (Some(p), Some(q)) => assert!(close(p, q)),
                (None, None) => {}
                other => panic!("asymmetric result {other:?}"),
            }
        }
    }

    #[test]
    fn parallel_and_coincident_segments_do_not_intersect() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!(segment_intersection(a, b, Point::new(0.0, 5.0), Point::new(10.0, 5.0)).is_none());
        assert!(segment_intersection(a, b, Point::new(2.0, 0.0), Point::new(8.0, 0.0)).is_none());
    }

    #[test]
    fn intersection_outside_segment_extent_is_rejected() {
        let hit = segment_intersection(
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(3.0, -1.0),
            Point::new(3.0, 1.0),
        );
        assert!(hit.is_none());
    }

    #[test]
    fn distance_clamps_to_segment_ends() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((distance_point_to_segment(Point::new(5.0, 3.0), a, b) - 3.0).abs() < EPS);
        assert!((distance_point_to_segment(Point::new(-3.0, 4.0), a, b) - 5.0).abs() < EPS);
        assert!((distance_point_to_segment(Point::new(13.0, 4.0), a, b) - 5.0).abs() < EPS);
    }

    #[test]
    fn zero_length_segment_is_a_point() {
        let a = Point::new(2.0, 2.0);
        let d = distance_point_to_segment(Point::new(5.0, 6.0), a, a);
        assert!((d - 5.0).abs() < EPS);
    }

    #[test]
    fn heading_matches_forward_convention() {
        let origin = Point::new(0.0, 0.0);
        assert!(heading_to(origin, Point::new(0.0, -10.0)).abs() < EPS);
        assert!((heading_to(origin, Point::new(10.0, 0.0)) - PI / 2.0).abs() < EPS);

        let ahead = origin.project(PI / 2.0, 10.0);
        assert!(close(ahead, Point::new(10.0, 0.0)));
    }

    #[test]
    fn angles_wrap_into_half_open_range() {
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < EPS);
        assert!((normalize_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < EPS);
        assert!((normalize_angle(-PI) - PI).abs() < EPS);
        assert!((normalize_angle(0.25) - 0.25).abs() < EPS);
    }
}
