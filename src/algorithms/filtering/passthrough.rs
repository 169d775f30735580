//! Axis-aligned pass-through filtering.

use crate::core::types::FeatureCloud;

/// Keep only points whose z coordinate lies in `[min_z, max_z]`.
///
/// Used for the adaptive ground cut before clustering: the lower bound is
/// the midpoint of the configured sensor floor and the frame's observed
/// ground-level mean.
pub fn filter_z(cloud: &FeatureCloud, min_z: f32, max_z: f32) -> FeatureCloud {
    cloud
        .iter()
        .filter(|p| p.z >= min_z && p.z <= max_z)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FeaturePoint;

    #[test]
    fn test_filter_z_bounds_inclusive() {
        let mut cloud = FeatureCloud::new();
        for z in [-2.0, -1.0, 0.0, 1.0, 2.0] {
            cloud.push(FeaturePoint::new(0.0, 0.0, z));
        }
        let kept = filter_z(&cloud, -1.0, 1.0);
        assert_eq!(kept.len(), 3);
        assert!(kept.iter().all(|p| p.z >= -1.0 && p.z <= 1.0));
    }

    #[test]
    fn test_filter_z_empty_result() {
        let mut cloud = FeatureCloud::new();
        cloud.push(FeaturePoint::new(0.0, 0.0, 5.0));
        assert!(filter_z(&cloud, -1.0, 1.0).is_empty());
    }
}
