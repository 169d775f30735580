//! Feature-to-map correspondence search.
//!
//! For every down-sampled stack point, queries the working slab's k-d tree
//! for its five nearest map neighbors, records the mean per-coordinate
//! displacement into the point's normal slot (read back later by cluster
//! scoring), and — if the neighborhood is tight enough — fits either a line
//! (edge features, via the covariance eigendecomposition) or a plane
//! (planar features, via least squares) to produce a residual constraint.

use kiddo::{KdTree, NearestNeighbour, SquaredEuclidean};
use nalgebra::{Matrix3, Vector3};

use crate::core::math::sorted_symmetric_eigen;
use crate::core::types::{Accumulator, FeatureCloud, FeaturePoint, Pose3D};

/// Neighbors queried per stack point.
pub const NEIGHBOR_COUNT: usize = 5;

/// Squared distance bound on the fifth neighbor for a usable neighborhood.
pub const MAX_NEIGHBOR_SQ_DIST: f32 = 1.0;

/// Largest-to-middle eigenvalue ratio required for line-likeness.
const LINE_EIGEN_RATIO: f64 = 3.0;

/// Anchor offset along the fitted line direction in meters.
const LINE_ANCHOR_OFFSET: f64 = 0.1;

/// Maximum distance of any neighbor from the fitted plane in meters.
const PLANE_FIT_TOLERANCE: f64 = 0.2;

/// Bulk-built nearest-neighbor index over a map slab.
pub struct FeatureIndex {
    tree: KdTree<f32, 3>,
}

impl FeatureIndex {
    /// Build an index over a cloud. Item payloads are point indices.
    pub fn build(cloud: &FeatureCloud) -> Self {
        let mut tree: KdTree<f32, 3> = KdTree::new();
        for (i, p) in cloud.iter().enumerate() {
            tree.add(&[p.x, p.y, p.z], i as u64);
        }
        Self { tree }
    }

    /// K-nearest query, ascending by squared distance.
    fn nearest(&self, query: &[f32; 3], count: usize) -> Vec<NearestNeighbour<f32, u64>> {
        self.tree.nearest_n::<SquaredEuclidean>(query, count)
    }
}

/// A line constraint: the query point should lie on the line through the
/// two anchor points.
#[derive(Debug, Clone)]
pub struct EdgeCorrespondence {
    /// Query point in the sensor frame
    pub point: Vector3<f64>,
    /// First anchor on the fitted map line (world frame)
    pub line_a: Vector3<f64>,
    /// Second anchor on the fitted map line (world frame)
    pub line_b: Vector3<f64>,
}

/// A plane constraint: the query point should lie on the fitted map plane.
#[derive(Debug, Clone)]
pub struct PlaneCorrespondence {
    /// Query point in the sensor frame
    pub point: Vector3<f64>,
    /// Unit plane normal (world frame)
    pub normal: Vector3<f64>,
    /// Plane offset: `normal · x + offset = 0` on the plane
    pub offset: f64,
}

/// Record the mean neighbor displacement into the stack point's normal slot
/// and feed its magnitude to the running statistics.
///
/// Returns the neighbor list when all five neighbors exist and the fifth is
/// within [`MAX_NEIGHBOR_SQ_DIST`], otherwise `None`.
fn record_displacement(
    stack_point: &mut FeaturePoint,
    world: &FeaturePoint,
    map: &FeatureCloud,
    index: &FeatureIndex,
    displacement_stats: &mut Accumulator,
) -> Option<Vec<NearestNeighbour<f32, u64>>> {
    let neighbors = index.nearest(&[world.x, world.y, world.z], NEIGHBOR_COUNT);
    if neighbors.len() < NEIGHBOR_COUNT {
        return None;
    }

    let mut dx = 0.0f32;
    let mut dy = 0.0f32;
    let mut dz = 0.0f32;
    for n in &neighbors {
        let q = &map.points[n.item as usize];
        dx += world.x - q.x;
        dy += world.y - q.y;
        dz += world.z - q.z;
    }
    let inv = 1.0 / NEIGHBOR_COUNT as f32;
    stack_point.normal = [dx * inv, dy * inv, dz * inv];
    displacement_stats.add(f64::from(stack_point.normal_magnitude()));

    if neighbors[NEIGHBOR_COUNT - 1].distance < MAX_NEIGHBOR_SQ_DIST {
        Some(neighbors)
    } else {
        None
    }
}

/// Associate edge stack points with map lines.
///
/// Mutates the stack in place (normal slots) and pushes accepted line
/// constraints onto `out`. Every stack point's sensor-frame z also feeds
/// the frame's ground-level accumulator.
pub fn associate_edges(
    stack: &mut FeatureCloud,
    map: &FeatureCloud,
    index: &FeatureIndex,
    pose: &Pose3D,
    ground_level: &mut Accumulator,
    displacement_stats: &mut Accumulator,
    out: &mut Vec<EdgeCorrespondence>,
) {
    for point in stack.points.iter_mut() {
        ground_level.add(f64::from(point.z));
        let world = pose.transform_feature(point);

        let Some(neighbors) = record_displacement(point, &world, map, index, displacement_stats)
        else {
            continue;
        };

        // Zero-mean covariance of the neighborhood.
        let mut center = Vector3::zeros();
        let positions: Vec<Vector3<f64>> = neighbors
            .iter()
            .map(|n| map.points[n.item as usize].position())
            .collect();
        for p in &positions {
            center += p;
        }
        center /= NEIGHBOR_COUNT as f64;

        let mut covariance = Matrix3::zeros();
        for p in &positions {
            let centered = p - center;
            covariance += centered * centered.transpose();
        }

        let (eigenvalues, eigenvectors) = sorted_symmetric_eigen(covariance);
        if eigenvalues[2] > LINE_EIGEN_RATIO * eigenvalues[1] {
            let direction: Vector3<f64> = eigenvectors.column(2).into_owned();
            out.push(EdgeCorrespondence {
                point: point.position(),
                line_a: center + LINE_ANCHOR_OFFSET * direction,
                line_b: center - LINE_ANCHOR_OFFSET * direction,
            });
        }
    }
}

/// Associate planar stack points with map planes.
pub fn associate_planes(
    stack: &mut FeatureCloud,
    map: &FeatureCloud,
    index: &FeatureIndex,
    pose: &Pose3D,
    ground_level: &mut Accumulator,
    displacement_stats: &mut Accumulator,
    out: &mut Vec<PlaneCorrespondence>,
) {
    for point in stack.points.iter_mut() {
        ground_level.add(f64::from(point.z));
        let world = pose.transform_feature(point);

        let Some(neighbors) = record_displacement(point, &world, map, index, displacement_stats)
        else {
            continue;
        };

        let positions: Vec<Vector3<f64>> = neighbors
            .iter()
            .map(|n| map.points[n.item as usize].position())
            .collect();

        // Fit `A·n = -1` through the five neighbors via normal equations.
        let mut ata = Matrix3::zeros();
        let mut atb = Vector3::zeros();
        for p in &positions {
            ata += p * p.transpose();
            atb -= p;
        }
        let Some(inv) = ata.try_inverse() else {
            continue;
        };
        let raw_normal: Vector3<f64> = inv * atb;
        let norm = raw_normal.norm();
        if norm < 1e-9 {
            continue;
        }
        let offset = 1.0 / norm;
        let normal = raw_normal / norm;

        // Reject neighborhoods that do not actually lie on the plane.
        let plane_fits = positions
            .iter()
            .all(|p| (normal.dot(p) + offset).abs() <= PLANE_FIT_TOLERANCE);
        if plane_fits {
            out.push(PlaneCorrespondence {
                point: point.position(),
                normal,
                offset,
            });
        }
    }
}
