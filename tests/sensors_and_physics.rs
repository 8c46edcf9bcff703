use racer_lib::game_server::{
    ai::{neural::RewardBreakdown, AdaptationController},
    cast_rays,
    geometry::{distance_point_to_segment, segment_intersection},
    progress::CheckpointProgress,
    sensors::Pose,
    Point, Segment, Track, Vehicle, VehicleParams,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn circuit() -> Track {
    Track::circuit(2400.0, 1800.0, 120.0).unwrap()
}

fn origin_pose() -> Pose {
    Pose {
        position: Point::new(0.0, 0.0),
        angle: 0.0,
    }
}

#[test]
fn head_on_barrier_reads_its_distance() {
    let wall = Segment::new(Point::new(-100.0, -50.0), Point::new(100.0, -50.0));
    let readings = cast_rays(origin_pose(), &[wall], 1, 150.0, 0.0);
    assert_eq!(readings.len(), 1);
    assert!((readings[0] - 50.0).abs() < 1e-3, "{readings:?}");
}

#[test]
fn unobstructed_rays_read_full_length() {
    let far_wall = Segment::new(Point::new(-100.0, -500.0), Point::new(100.0, -500.0));
    assert_eq!(cast_rays(origin_pose(), &[], 1, 150.0, 0.0), vec![150.0]);
    assert_eq!(
        cast_rays(origin_pose(), &[far_wall], 5, 150.0, 1.0),
        vec![150.0; 5]
    );
}

#[test]
fn readings_never_exceed_ray_length() {
    let track = circuit();
    let mut rng = StdRng::seed_from_u64(17);

    for _ in 0..200 {
        let pose = Pose {
            position: Point::new(rng.gen_range(0.0..2400.0), rng.gen_range(0.0..1800.0)),
            angle: rng.gen_range(-3.2..3.2),
        };
        let length = rng.gen_range(10.0..300.0);
        for reading in cast_rays(pose, track.barriers(), 9, length, 2.5) {
            assert!((0.0..=length).contains(&reading), "{reading} > {length}");
        }
    }
}

#[test]
fn intersection_is_symmetric() {
    let cases = [
        // Crossing
        (
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        ),
        // Disjoint
        (
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(5.0, 5.0),
            Point::new(6.0, 9.0),
        ),
        // Parallel
        (
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 3.0),
            Point::new(10.0, 3.0),
        ),
        // Collinear overlap is reported as no hit
        (
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(15.0, 0.0),
        ),
        // Touching at an endpoint
        (
            Point::new(0.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(8.0, 0.0),
        ),
    ];

    for (a, b, c, d) in cases {
        let forward = segment_intersection(a, b, c, d);
        let backward = segment_intersection(c, d, a, b);
        match (forward, backward) {
            (Some(p), Some(q)) => assert!(p.distance_to(q) < 1e-4),
            (None, None) => {}
            other => panic!("asymmetric result {other:?}"),
        }
    }
}

#[test]
fn zero_length_segment_is_point_distance() {
    let p = Point::new(3.0, 4.0);
    let origin = Point::new(0.0, 0.0);
    assert!((distance_point_to_segment(p, origin, origin) - 5.0).abs() < 1e-6);
}

#[test]
fn velocity_stays_within_the_boosted_cap() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut car = Vehicle::new(
        1,
        "test car",
        "#FFFFFF",
        &VehicleParams::default(),
        Point::new(0.0, 0.0),
        0.0,
    );

    for _ in 0..2000 {
        if rng.gen_bool(0.1) {
            car.boost = !car.boost;
        }
        let dt = rng.gen_range(0.0..0.5);
        car.accelerate(dt);
        let cap = car.max_velocity * if car.boost { car.boost_multiplier } else { 1.0 };
        assert!(car.velocity.abs() <= cap + 1e-3);
        car.update(dt);
    }
}

#[test]
fn drift_decays_to_zero_and_stays_there() {
    let mut car = Vehicle::new(
        1,
        "test car",
        "#FFFFFF",
        &VehicleParams::default(),
        Point::new(0.0, 0.0),
        0.0,
    );
    car.drifting = true;
    car.velocity = 200.0;
    for _ in 0..60 {
        car.update(1.0 / 60.0);
    }
    assert!(car.drift_factor > 0.0);

    car.drifting = false;
    let mut previous = car.drift_factor;
    for _ in 0..120 {
        car.update(1.0 / 60.0);
        assert!(car.drift_factor <= previous);
        previous = car.drift_factor;
    }
    assert_eq!(car.drift_factor, 0.0);
}

#[test]
fn collision_rebounds_with_less_speed() {
    let mut car = Vehicle::new(
        1,
        "test car",
        "#FFFFFF",
        &VehicleParams::default(),
        Point::new(0.0, 0.0),
        0.0,
    );
    car.velocity = 100.0;
    car.drifting = true;
    car.handle_collision();
    assert!(car.velocity < 0.0);
    assert!(car.velocity.abs() < 100.0);
    assert!(!car.drifting);
}

#[test]
fn one_lap_per_full_circuit() {
    let track = circuit();
    let checkpoints = track.checkpoints();
    let mut progress = CheckpointProgress::new(checkpoints.len());

    for (i, &checkpoint) in checkpoints.iter().enumerate() {
        let advance = progress.update(checkpoint, checkpoints).unwrap();
        assert_eq!(advance.crossed, i);
        assert_eq!(advance.lap_completed, i == checkpoints.len() - 1);
    }
    assert_eq!(progress.target_checkpoint(), 0);
    assert_eq!(progress.laps(), 1);

    // Idling on the finish line does not count again
    assert!(progress.update(checkpoints[checkpoints.len() - 1], checkpoints).is_none());
    assert_eq!(progress.laps(), 1);
}

#[test]
fn closing_on_the_checkpoint_earns_the_progress_term() {
    let reward = RewardBreakdown::score(150.0, 300.0, &[200.0; 9], 240.0, 250.0, Some(30.0));
    assert_eq!(reward.progress, RewardBreakdown::PROGRESS_STEP);

    let reward = RewardBreakdown::score(150.0, 300.0, &[200.0; 9], 260.0, 250.0, Some(30.0));
    assert_eq!(reward.progress, -RewardBreakdown::PROGRESS_STEP);
}

#[test]
fn skill_survives_extreme_players() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut controller = AdaptationController::new(0.9);
    let player = |speed: f32, x: f32| {
        let mut snapshot = Vehicle::new(
            0,
            "player",
            "#8B5CF6",
            &VehicleParams::player(),
            Point::new(x, 900.0),
            0.0,
        )
        .snapshot();
        snapshot.speed = speed;
        snapshot
    };

    for _ in 0..10_000 {
        let speed = if rng.gen_bool(0.5) { 0.0 } else { 1.0e12 };
        let x = rng.gen_range(-5000.0..5000.0);
        controller.adapt(Point::new(0.0, 900.0), &player(speed, x), 0.1);
        let skill = controller.skill_level();
        assert!((0.2..=0.95).contains(&skill), "{skill}");
    }
}
