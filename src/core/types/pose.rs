//! Rigid 3D pose built on a unit quaternion.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::point::FeaturePoint;

/// Rigid transform in 3D space: rotation as a unit quaternion plus a
/// translation vector.
///
/// Used both for sensor poses (`T_w_curr`) and for frame-to-frame links
/// such as the odometry-world-to-map-world correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose3D {
    /// Rotation part
    pub rotation: UnitQuaternion<f64>,
    /// Translation part in meters
    pub translation: Vector3<f64>,
}

impl Pose3D {
    /// Create a pose from rotation and translation.
    #[inline]
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Identity pose at the origin.
    #[inline]
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Compose two poses: `self ∘ other`.
    ///
    /// Applies `other` first, then `self`; the composed transform maps a
    /// point `p` to `R_self (R_other p + t_other) + t_self`.
    #[inline]
    pub fn compose(&self, other: &Pose3D) -> Pose3D {
        Pose3D {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Inverse of this pose.
    #[inline]
    pub fn inverse(&self) -> Pose3D {
        let inv_rotation = self.rotation.inverse();
        Pose3D {
            rotation: inv_rotation,
            translation: -(inv_rotation * self.translation),
        }
    }

    /// Transform a point from the local frame into the parent frame.
    #[inline]
    pub fn transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * point + self.translation
    }

    /// Transform a point from the parent frame back into the local frame.
    #[inline]
    pub fn inverse_transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * (point - self.translation)
    }

    /// Lift a feature point into the parent frame, carrying intensity,
    /// normal slot and curvature tag through unchanged.
    #[inline]
    pub fn transform_feature(&self, point: &FeaturePoint) -> FeaturePoint {
        point.with_position(self.transform_point(&point.position()))
    }

    /// Drop a feature point back into the local frame.
    #[inline]
    pub fn inverse_transform_feature(&self, point: &FeaturePoint) -> FeaturePoint {
        point.with_position(self.inverse_transform_point(&point.position()))
    }

    /// Row-major 3×4 matrix of this pose re-axed into the camera-forward
    /// convention used by the trajectory file:
    /// `t' = (−t_y, −t_z, t_x)`, `q' = (w, −q_y, −q_z, q_x)`.
    ///
    /// Output-only; internal math stays in native LiDAR axes.
    pub fn reaxed_matrix_rows(&self) -> [f64; 12] {
        let q = self.rotation.quaternion();
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(q.w, -q.j, -q.k, q.i));
        let t = Vector3::new(-self.translation.y, -self.translation.z, self.translation.x);
        let r = rotation.to_rotation_matrix();
        let m = r.matrix();
        [
            m[(0, 0)],
            m[(0, 1)],
            m[(0, 2)],
            t.x,
            m[(1, 0)],
            m[(1, 1)],
            m[(1, 2)],
            t.y,
            m[(2, 0)],
            m[(2, 1)],
            m[(2, 2)],
            t.z,
        ]
    }
}

impl Default for Pose3D {
    fn default() -> Self {
        Self::identity()
    }
}
