//! Benchmark the scan-to-map refinement stage.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use nalgebra::{UnitQuaternion, Vector3};
use sthira_slam::algorithms::matching::AssociationStats;
use sthira_slam::{Accumulator, FeatureCloud, FeaturePoint, Pose3D, ScanToMapMatcher};

/// Synthetic room: edge posts at the corners and planar walls, with tiny
/// jitter so the k-d tree never sees exactly collinear buckets.
fn room_maps(wall_points: usize) -> (FeatureCloud, FeatureCloud) {
    let mut edges = FeatureCloud::new();
    for (x, y) in [(4.0, 4.0), (4.0, -4.0), (-4.0, 4.0), (-4.0, -4.0)] {
        for i in 0..40 {
            edges.push(FeaturePoint::new(
                x + i as f32 * 2e-4,
                y + (i % 3) as f32 * 1e-4,
                i as f32 * 0.075,
            ));
        }
    }

    let mut planes = FeatureCloud::new();
    let n = (wall_points as f32).sqrt() as usize;
    for i in 0..n {
        for j in 0..n {
            let x = -4.0 + 8.0 * i as f32 / n as f32;
            let z = 3.0 * j as f32 / n as f32;
            planes.push(FeaturePoint::new(x, 4.5 + (i + j) as f32 * 1e-5, z));
            planes.push(FeaturePoint::new(x, -4.5 - (i + j) as f32 * 1e-5, z));
        }
    }
    (edges, planes)
}

fn bench_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_to_map");

    for wall_points in [900usize, 2500, 6400] {
        let (edge_map, plane_map) = room_maps(wall_points);
        let offset = Pose3D::new(
            UnitQuaternion::from_scaled_axis(Vector3::new(0.0, 0.0, 0.01)),
            Vector3::new(0.05, -0.03, 0.02),
        );
        let edge_stack: FeatureCloud = edge_map
            .iter()
            .map(|p| offset.inverse_transform_feature(p))
            .collect();
        let plane_stack: FeatureCloud = plane_map
            .iter()
            .map(|p| offset.inverse_transform_feature(p))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(wall_points),
            &wall_points,
            |b, _| {
                let matcher = ScanToMapMatcher::default();
                b.iter(|| {
                    let mut pose = Pose3D::identity();
                    let mut edge_stack = edge_stack.clone();
                    let mut plane_stack = plane_stack.clone();
                    let mut ground = Accumulator::new();
                    let mut edge_disp = Accumulator::new();
                    let mut plane_disp = Accumulator::new();
                    let outcome = matcher.refine(
                        &mut pose,
                        &mut edge_stack,
                        &mut plane_stack,
                        &edge_map,
                        &plane_map,
                        &mut AssociationStats {
                            ground_level: &mut ground,
                            edge_displacement: &mut edge_disp,
                            plane_displacement: &mut plane_disp,
                        },
                    );
                    black_box((pose, outcome))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_refine);
criterion_main!(benches);
