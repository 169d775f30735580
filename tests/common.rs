//! Shared scene and frame generators for the pipeline scenarios.

use nalgebra::Vector3;
use sthira_slam::engine::StagedFrame;
use sthira_slam::{FeatureCloud, FeaturePoint, MappingSink, Pose3D, Timestamped};

/// Edge-tag curvature (at or below the split threshold).
pub const EDGE_TAG: f32 = 0.05;
/// Plane-tag curvature (above the split threshold).
pub const PLANE_TAG: f32 = 0.5;

/// Frame period for a 10 Hz sensor.
pub const FRAME_US: u64 = 100_000;

fn tagged(x: f32, y: f32, z: f32, curvature: f32) -> FeaturePoint {
    let mut p = FeaturePoint::new(x, y, z);
    p.curvature = curvature;
    p.intensity = 1.0;
    p
}

/// Vertical edge post: `count` points along z with slight jitter so no
/// five points are exactly collinear.
pub fn edge_post(x: f32, y: f32, count: usize) -> FeatureCloud {
    (0..count)
        .map(|i| {
            let z = i as f32 * 0.1;
            tagged(
                x + i as f32 * 3e-4,
                y + (i % 3) as f32 * 2e-4,
                z,
                EDGE_TAG,
            )
        })
        .collect()
}

/// Vertical wall patch in the x-z plane at the given y, spanning
/// `[x0, x1] × [0, height]` with ~0.25 m spacing.
pub fn wall(x0: f32, x1: f32, y: f32, height: f32) -> FeatureCloud {
    let mut cloud = FeatureCloud::new();
    let nx = ((x1 - x0) / 0.25) as usize + 1;
    let nz = (height / 0.25) as usize + 1;
    for i in 0..nx {
        for j in 0..nz {
            cloud.push(tagged(
                x0 + i as f32 * 0.25,
                y + (i * nz + j) as f32 * 1e-5,
                j as f32 * 0.25,
                PLANE_TAG,
            ));
        }
    }
    cloud
}

/// A static world: four edge posts and two facing walls.
pub fn static_world() -> (FeatureCloud, FeatureCloud) {
    let mut edges = FeatureCloud::new();
    for (x, y) in [(3.0, 3.0), (3.0, -3.0), (-3.0, 3.0), (-3.0, -3.0)] {
        edges.extend_from(&edge_post(x, y, 30));
    }
    let mut planes = FeatureCloud::new();
    planes.extend_from(&wall(-5.0, 5.0, 4.0, 3.0));
    planes.extend_from(&wall(-5.0, 5.0, -4.0, 3.0));
    (edges, planes)
}

/// A corridor along +x with walls and posts repeating every 5 m.
pub fn corridor_world(length: f32) -> (FeatureCloud, FeatureCloud) {
    let mut edges = FeatureCloud::new();
    let mut post_x = -5.0f32;
    while post_x <= length {
        edges.extend_from(&edge_post(post_x, 2.8, 25));
        edges.extend_from(&edge_post(post_x, -2.8, 25));
        post_x += 5.0;
    }
    let mut planes = FeatureCloud::new();
    planes.extend_from(&wall(-5.0, length, 3.0, 3.0));
    planes.extend_from(&wall(-5.0, length, -3.0, 3.0));
    (edges, planes)
}

/// Person-sized blob of plane-tagged points centered at `center`.
pub fn mover_blob(center: Vector3<f32>) -> FeatureCloud {
    let mut cloud = FeatureCloud::new();
    for i in 0..5 {
        for j in 0..5 {
            for k in 0..8 {
                cloud.push(tagged(
                    center.x - 0.25 + i as f32 * 0.125,
                    center.y - 0.25 + j as f32 * 0.125,
                    center.z + k as f32 * 0.1875,
                    PLANE_TAG,
                ));
            }
        }
    }
    cloud
}

/// Restrict a world cloud to returns within `range` of the sensor.
pub fn visible_from(cloud: &FeatureCloud, sensor: &Pose3D, range: f32) -> FeatureCloud {
    let origin = sensor.translation;
    cloud
        .iter()
        .filter(|p| (p.position() - origin).norm() < f64::from(range))
        .copied()
        .collect()
}

/// Build a staged frame from world-frame clouds and a ground-truth
/// odometry pose: inputs arrive in the sensor frame, exactly as the
/// front-end would deliver them.
pub fn make_frame(
    time_us: u64,
    odometry: &Pose3D,
    edges_world: &FeatureCloud,
    planes_world: &FeatureCloud,
) -> StagedFrame {
    let to_sensor =
        |cloud: &FeatureCloud| -> FeatureCloud {
            cloud
                .iter()
                .map(|p| odometry.inverse_transform_feature(p))
                .collect()
        };
    let corner = to_sensor(edges_world);
    let surf = to_sensor(planes_world);
    let mut full = FeatureCloud::new();
    full.extend_from(&corner);
    full.extend_from(&surf);

    StagedFrame {
        corner,
        surf,
        full,
        odometry: *odometry,
        time_us,
    }
}

/// Sink that counts publications and keeps the latest payload sizes.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub refined_poses: Vec<Timestamped<Pose3D>>,
    pub trajectory_len: usize,
    pub surround_count: usize,
    pub map_count: usize,
    pub static_map_count: usize,
    pub registered_count: usize,
    pub dynamic_clouds: Vec<usize>,
    pub transform_count: usize,
}

impl MappingSink for CollectingSink {
    fn on_refined_pose(&mut self, pose: &Timestamped<Pose3D>) {
        self.refined_poses.push(pose.clone());
    }

    fn on_trajectory(&mut self, trajectory: &[Timestamped<Pose3D>]) {
        self.trajectory_len = trajectory.len();
    }

    fn on_map_to_sensor(&mut self, _transform: &Timestamped<Pose3D>) {
        self.transform_count += 1;
    }

    fn on_registered_cloud(&mut self, _cloud: &FeatureCloud, _time_us: u64) {
        self.registered_count += 1;
    }

    fn on_dynamic_cloud(&mut self, cloud: &FeatureCloud, _time_us: u64) {
        self.dynamic_clouds.push(cloud.len());
    }

    fn on_surround_cloud(&mut self, _cloud: &FeatureCloud, _time_us: u64) {
        self.surround_count += 1;
    }

    fn on_map_cloud(&mut self, _cloud: &FeatureCloud, _time_us: u64) {
        self.map_count += 1;
    }

    fn on_static_map(&mut self, _cloud: &FeatureCloud, _time_us: u64) {
        self.static_map_count += 1;
    }
}
