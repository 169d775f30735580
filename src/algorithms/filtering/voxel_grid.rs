//! Voxel-grid down-sampling.

use std::collections::BTreeMap;

use crate::core::types::{FeatureCloud, FeaturePoint};

/// Deterministic voxel-grid down-sampler.
///
/// Snaps points to a regular grid of the configured leaf size and replaces
/// every occupied voxel with the average of its members (all fields,
/// including the normal slot and curvature tag). Voxels are emitted in
/// lexicographic key order, so the output ordering does not depend on the
/// input ordering within a voxel.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    leaf_size: f32,
}

impl VoxelGrid {
    /// Create a down-sampler with a cubic leaf of the given edge length.
    pub fn new(leaf_size: f32) -> Self {
        debug_assert!(leaf_size > 0.0);
        Self { leaf_size }
    }

    /// Current leaf edge length in meters.
    #[inline]
    pub fn leaf_size(&self) -> f32 {
        self.leaf_size
    }

    /// Rebind the leaf size (used by the adaptive resolution controller).
    pub fn set_leaf_size(&mut self, leaf_size: f32) {
        debug_assert!(leaf_size > 0.0);
        self.leaf_size = leaf_size;
    }

    /// Down-sample a cloud.
    pub fn filter(&self, cloud: &FeatureCloud) -> FeatureCloud {
        let mut voxels: BTreeMap<(i64, i64, i64), VoxelAverage> = BTreeMap::new();
        let inv_leaf = 1.0 / self.leaf_size;

        for point in cloud.iter() {
            let key = (
                (point.x * inv_leaf).floor() as i64,
                (point.y * inv_leaf).floor() as i64,
                (point.z * inv_leaf).floor() as i64,
            );
            voxels.entry(key).or_default().add(point);
        }

        voxels.values().map(VoxelAverage::finish).collect()
    }
}

/// Running per-voxel sums.
#[derive(Debug, Default)]
struct VoxelAverage {
    count: u32,
    sum: [f64; 8],
}

impl VoxelAverage {
    fn add(&mut self, p: &FeaturePoint) {
        self.count += 1;
        for (slot, value) in self.sum.iter_mut().zip([
            p.x,
            p.y,
            p.z,
            p.intensity,
            p.normal[0],
            p.normal[1],
            p.normal[2],
            p.curvature,
        ]) {
            *slot += f64::from(value);
        }
    }

    fn finish(&self) -> FeaturePoint {
        let n = f64::from(self.count);
        let avg = |i: usize| (self.sum[i] / n) as f32;
        FeaturePoint {
            x: avg(0),
            y: avg(1),
            z: avg(2),
            intensity: avg(3),
            normal: [avg(4), avg(5), avg(6)],
            curvature: avg(7),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cloud_of(positions: &[(f32, f32, f32)]) -> FeatureCloud {
        positions
            .iter()
            .map(|&(x, y, z)| FeaturePoint::new(x, y, z))
            .collect()
    }

    #[test]
    fn test_merges_points_in_same_voxel() {
        let cloud = cloud_of(&[(0.01, 0.01, 0.01), (0.04, 0.04, 0.04)]);
        let filtered = VoxelGrid::new(0.1).filter(&cloud);
        assert_eq!(filtered.len(), 1);
        assert_relative_eq!(filtered.points[0].x, 0.025, epsilon = 1e-6);
    }

    #[test]
    fn test_keeps_points_in_distinct_voxels() {
        let cloud = cloud_of(&[(0.05, 0.0, 0.0), (0.95, 0.0, 0.0), (2.05, 0.0, 0.0)]);
        let filtered = VoxelGrid::new(0.1).filter(&cloud);
        assert_eq!(filtered.len(), 3);
    }

    #[test]
    fn test_negative_coordinates_snap_with_floor() {
        // -0.05 and +0.05 must land in different voxels.
        let cloud = cloud_of(&[(-0.05, 0.0, 0.0), (0.05, 0.0, 0.0)]);
        let filtered = VoxelGrid::new(0.1).filter(&cloud);
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_deterministic_across_input_order() {
        let forward = cloud_of(&[(0.0, 0.0, 0.0), (1.0, 1.0, 1.0), (0.02, 0.0, 0.0)]);
        let mut reversed = forward.clone();
        reversed.points.reverse();

        let grid = VoxelGrid::new(0.1);
        assert_eq!(grid.filter(&forward), grid.filter(&reversed));
    }

    #[test]
    fn test_averages_attributes() {
        let mut a = FeaturePoint::new(0.0, 0.0, 0.0);
        a.intensity = 1.0;
        a.curvature = 0.2;
        let mut b = FeaturePoint::new(0.02, 0.0, 0.0);
        b.intensity = 3.0;
        b.curvature = 0.4;

        let mut cloud = FeatureCloud::new();
        cloud.push(a);
        cloud.push(b);

        let filtered = VoxelGrid::new(0.1).filter(&cloud);
        assert_eq!(filtered.len(), 1);
        assert_relative_eq!(filtered.points[0].intensity, 2.0, epsilon = 1e-6);
        assert_relative_eq!(filtered.points[0].curvature, 0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_cloud() {
        let filtered = VoxelGrid::new(0.1).filter(&FeatureCloud::new());
        assert!(filtered.is_empty());
    }
}
