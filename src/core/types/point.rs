//! Feature point and feature cloud types.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Curvature threshold separating edge points from planar points.
///
/// The front-end tags each return with its local curvature; after the
/// combined stack has been filtered, points are re-split into edge and
/// plane sub-stacks against this value (at or below = edge, above = plane).
pub const EDGE_CURVATURE_THRESHOLD: f32 = 0.1;

/// A single LiDAR feature return.
///
/// Carries position, return intensity, a three-component normal slot and a
/// curvature tag. The normal slot is scratch space: during feature-to-map
/// association it is overwritten with the mean per-coordinate displacement
/// from the query point to its map neighbors, which downstream cluster
/// scoring reads back.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeaturePoint {
    /// X coordinate in meters
    pub x: f32,
    /// Y coordinate in meters
    pub y: f32,
    /// Z coordinate in meters
    pub z: f32,
    /// Return intensity (also reused as a per-point annotation slot)
    pub intensity: f32,
    /// Normal slot: mean neighbor displacement after association
    pub normal: [f32; 3],
    /// Curvature tag from the feature-extraction front-end
    pub curvature: f32,
}

impl FeaturePoint {
    /// Create a bare point at a position.
    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    /// Position as an f64 vector for solver math.
    #[inline]
    pub fn position(&self) -> Vector3<f64> {
        Vector3::new(f64::from(self.x), f64::from(self.y), f64::from(self.z))
    }

    /// Overwrite the position, keeping all other fields.
    #[inline]
    pub fn with_position(mut self, p: Vector3<f64>) -> Self {
        self.x = p.x as f32;
        self.y = p.y as f32;
        self.z = p.z as f32;
        self
    }

    /// Euclidean norm of the normal slot.
    #[inline]
    pub fn normal_magnitude(&self) -> f32 {
        let [nx, ny, nz] = self.normal;
        (nx * nx + ny * ny + nz * nz).sqrt()
    }

    /// True if the curvature tag classifies this point as an edge feature.
    #[inline]
    pub fn is_edge(&self) -> bool {
        self.curvature <= EDGE_CURVATURE_THRESHOLD
    }
}

/// An unordered cloud of feature points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCloud {
    pub points: Vec<FeaturePoint>,
}

impl FeatureCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Create an empty cloud with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point.
    #[inline]
    pub fn push(&mut self, point: FeaturePoint) {
        self.points.push(point);
    }

    /// Append all points of another cloud.
    pub fn extend_from(&mut self, other: &FeatureCloud) {
        self.points.extend_from_slice(&other.points);
    }

    /// Remove all points, keeping the allocation.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Keep only points for which the predicate holds.
    pub fn retain<F: FnMut(&FeaturePoint) -> bool>(&mut self, f: F) {
        self.points.retain(f);
    }

    /// Iterate over points.
    pub fn iter(&self) -> std::slice::Iter<'_, FeaturePoint> {
        self.points.iter()
    }

    /// Centroid of the cloud, or zero for an empty cloud.
    pub fn centroid(&self) -> Vector3<f64> {
        if self.points.is_empty() {
            return Vector3::zeros();
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.position());
        sum / self.points.len() as f64
    }
}

impl FromIterator<FeaturePoint> for FeatureCloud {
    fn from_iter<I: IntoIterator<Item = FeaturePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}
