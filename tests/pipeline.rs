//! End-to-end scenarios for the mapping pipeline.

mod common;

use common::*;
use nalgebra::Vector3;
use sthira_slam::engine::{MAP_DEPTH, MAP_HEIGHT, MAP_WIDTH};
use sthira_slam::{
    FeatureCloud, InputStaging, MapperConfig, MatchOutcome, Mapper, Pose3D, ResolutionController,
    Timestamped,
};

fn quiet_config() -> MapperConfig {
    let mut config = MapperConfig::default();
    // Fixed resolutions keep the scenarios deterministic.
    config.auto_mapping.enabled = false;
    config
}

/// Pose identity (invariant 1): `T_w_curr = T_wmap_wodom ∘ T_wodom_curr`
/// must hold after every frame.
fn assert_pose_identity(mapper: &Mapper, odometry: &Pose3D) {
    let recomposed = mapper
        .correction_link()
        .snapshot()
        .compose(odometry);
    let residue = (recomposed.translation - mapper.pose().translation).norm();
    assert!(residue < 1e-9, "translation residue {}", residue);
    assert!(recomposed.rotation.angle_to(&mapper.pose().rotation) < 1e-9);
}

#[test]
fn s1_identity_at_rest() {
    let (edges, planes) = static_world();
    let mut mapper = Mapper::new(quiet_config()).unwrap();
    let mut sink = CollectingSink::default();

    let odometry = Pose3D::identity();
    for frame in 0..20u64 {
        let staged = make_frame(frame * FRAME_US, &odometry, &edges, &planes);
        let summary = mapper.process_frame(staged, &mut sink);

        assert!(
            summary.pose.translation.norm() < 0.02,
            "frame {}: drifted to {:?}",
            frame,
            summary.pose.translation
        );
        assert!(summary.pose.rotation.angle() < 1e-3);
        assert_pose_identity(&mapper, &odometry);
    }

    // No cubes were evicted: the arena never rolled.
    assert_eq!(
        mapper.map().center(),
        [
            (MAP_WIDTH / 2) as i64,
            (MAP_HEIGHT / 2) as i64,
            (MAP_DEPTH / 2) as i64
        ]
    );

    // Publication cadence: surround every 5 frames, map every 20.
    assert_eq!(sink.registered_count, 20);
    assert_eq!(sink.trajectory_len, 20);
    assert_eq!(sink.surround_count, 4);
    assert_eq!(sink.map_count, 1);
    assert_eq!(sink.static_map_count, 1);
    assert_eq!(sink.transform_count, 20);
    assert_eq!(sink.refined_poses.len(), 20);
}

#[test]
fn s2_straight_translation() {
    let (edges, planes) = corridor_world(65.0);
    let mut mapper = Mapper::new(quiet_config()).unwrap();
    let mut sink = CollectingSink::default();

    for frame in 1..=120u64 {
        let odometry = Pose3D::new(
            nalgebra::UnitQuaternion::identity(),
            Vector3::new(frame as f64 * 0.5, 0.0, 0.0),
        );
        let visible_edges = visible_from(&edges, &odometry, 15.0);
        let visible_planes = visible_from(&planes, &odometry, 15.0);
        let staged = make_frame(frame * FRAME_US, &odometry, &visible_edges, &visible_planes);
        mapper.process_frame(staged, &mut sink);
        assert_pose_identity(&mapper, &odometry);
    }

    // Final pose within 5% of 60 m.
    let x = mapper.pose().translation.x;
    assert!((x - 60.0).abs() < 3.0, "final x = {}", x);

    // The sensor crossed exactly one cube boundary along +i and never got
    // close enough to the arena edge to trigger a roll.
    assert_eq!(mapper.map().cube_of(&mapper.pose().translation)[0], 11);
    assert_eq!(mapper.map().center(), [10, 10, 5]);
    assert_eq!(sink.trajectory_len, 120);
}

#[test]
fn s3_dynamic_removal() {
    let (mut edges, planes) = static_world();
    // A couple of extra posts densify the edge slab.
    edges.extend_from(&edge_post(0.0, 2.0, 30));
    edges.extend_from(&edge_post(0.0, -2.0, 30));

    let mut mapper = Mapper::new(quiet_config()).unwrap();
    let mut sink = CollectingSink::default();
    let odometry = Pose3D::identity();

    let mut dynamic_seen_after_settling = false;
    let mut total_at_frame_8 = 0usize;

    for frame in 0..15u64 {
        let mover_center = Vector3::new(-4.0 + frame as f32 * 1.0, 0.0, 0.0);
        let mut frame_planes = planes.clone();
        frame_planes.extend_from(&mover_blob(mover_center));

        let staged = make_frame(frame * FRAME_US, &odometry, &edges, &frame_planes);
        let summary = mapper.process_frame(staged, &mut sink);

        if frame >= 5 && summary.dynamic_count > 0 {
            dynamic_seen_after_settling = true;
        }
        if frame == 8 {
            total_at_frame_8 = mapper.map().total_points();
        }
    }

    assert!(
        dynamic_seen_after_settling,
        "tracker never flagged the mover as dynamic"
    );

    // Once the mover is being removed, the map grows like the static
    // scene alone: nowhere near the 200 points/frame the mover carries.
    let growth = mapper.map().total_points() as i64 - total_at_frame_8 as i64;
    assert!(
        growth < 600,
        "map grew by {} points while the mover should be filtered",
        growth
    );
}

#[test]
fn s4_time_desync_rejected() {
    let staging = InputStaging::new(16);
    staging.push_corner(Timestamped::new(FeatureCloud::new(), 1_000_000));
    staging.push_surf(Timestamped::new(FeatureCloud::new(), 1_050_000));
    staging.push_full(Timestamped::new(FeatureCloud::new(), 1_000_000));
    staging.push_odometry(Timestamped::new(Pose3D::identity(), 1_000_000));

    assert!(staging.try_take_frame().is_none());
    // Only the corner head was consumed; no other state mutated.
    assert_eq!(staging.depths(), (0, 1, 1, 1));
}

#[test]
fn s5_adaptive_coarsening_product() {
    // Target 1 ms, measured 100 ms: every frame multiplies the leaves by
    // the mixing-ratio factors.
    let mut controller = ResolutionController::new(true, 1.0, 0.1, 0.1);
    let corner_points = 400usize;
    let surf_points = 600usize;
    let rate_corner = 0.1 * corner_points as f32 / (corner_points + surf_points) as f32;
    let rate_surf = 0.1 - rate_corner;

    for _ in 0..10 {
        controller.update(100.0, corner_points, surf_points).unwrap();
    }

    let expected_line = 0.1 * (1.0 + rate_corner).powi(10);
    let expected_plane = 0.1 * (1.0 + rate_surf).powi(10);
    assert!((controller.line_res() - expected_line).abs() < 1e-6);
    assert!((controller.plane_res() - expected_plane).abs() < 1e-6);
}

#[test]
fn s6_first_frame_empty_map() {
    let (edges, planes) = static_world();
    let mut mapper = Mapper::new(quiet_config()).unwrap();
    let mut sink = CollectingSink::default();

    let odometry = Pose3D::new(
        nalgebra::UnitQuaternion::identity(),
        Vector3::new(0.3, 0.0, 0.0),
    );
    let staged = make_frame(0, &odometry, &edges, &planes);
    let summary = mapper.process_frame(staged, &mut sink);

    // No map to optimize against: pose is the odometry-derived guess.
    assert_eq!(summary.outcome, MatchOutcome::InsufficientMap);
    assert_eq!(summary.pose.translation, odometry.translation);
    assert_eq!(sink.refined_poses.len(), 1);
    assert!(
        (sink.refined_poses[0].data.translation - odometry.translation).norm() < 1e-12
    );

    // The cube map still grew.
    assert!(mapper.map().total_points() > 0);
}

#[test]
fn resolution_floor_holds_under_long_underrun() {
    // Invariant 4: the floor survives arbitrarily long refinement runs.
    let mut controller = ResolutionController::new(true, 1_000.0, 0.1, 0.1);
    for _ in 0..500 {
        controller.update(0.5, 100, 100).unwrap();
        assert!(controller.line_res() >= sthira_slam::engine::MIN_RESOLUTION);
        assert!(controller.plane_res() >= sthira_slam::engine::MIN_RESOLUTION);
    }
}

#[test]
fn bounded_memory_after_long_run() {
    // Invariant 3: repeated insertion plus the per-cube filter keeps the
    // map bounded regardless of how many frames arrive.
    let (edges, planes) = static_world();
    let mut mapper = Mapper::new(quiet_config()).unwrap();
    let mut sink = sthira_slam::NullSink;

    let odometry = Pose3D::identity();
    let mut totals = Vec::new();
    for frame in 0..30u64 {
        let staged = make_frame(frame * FRAME_US, &odometry, &edges, &planes);
        mapper.process_frame(staged, &mut sink);
        totals.push(mapper.map().total_points());
    }

    // After the scene is fully integrated the total must plateau.
    let late_min = *totals[20..].iter().min().unwrap();
    let late_max = *totals[20..].iter().max().unwrap();
    assert!(
        late_max - late_min <= late_min / 5,
        "map keeps growing: {:?}",
        &totals[20..]
    );
}
