//! Euclidean clustering with size gates and a human-shape heuristic.

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector3;

use crate::core::types::FeatureCloud;

/// Cluster detection parameters.
#[derive(Debug, Clone)]
pub struct ClusterParams {
    /// Euclidean clustering radius in meters
    pub tolerance: f32,
    /// Minimum member count
    pub min_pts: usize,
    /// Maximum member count
    pub max_pts: usize,
    /// Minimum largest bounding-box extent in meters
    pub min_size: f32,
    /// Maximum largest bounding-box extent in meters
    pub max_size: f32,
    /// Human-shape heuristic weight
    pub lambda: f32,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            tolerance: 0.2,
            min_pts: 8,
            max_pts: 8192,
            min_size: 0.2,
            max_size: 20.0,
            lambda: 20.0,
        }
    }
}

/// A detected cluster: bounding box, centroid, a human-likeness flag and
/// the owning member cloud. Lives for one frame unless adopted by a track.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Axis-aligned bounding-box minimum corner
    pub min_pt: Vector3<f64>,
    /// Axis-aligned bounding-box maximum corner
    pub max_pt: Vector3<f64>,
    /// Box extents per axis
    pub size: Vector3<f64>,
    /// Member centroid
    pub centroid: Vector3<f64>,
    /// Human-shape heuristic verdict
    pub is_human: bool,
    /// Member points
    pub cloud: FeatureCloud,
}

/// Euclidean cluster detector.
#[derive(Debug, Clone, Default)]
pub struct ClusterDetector {
    params: ClusterParams,
}

impl ClusterDetector {
    /// Create a detector with the given parameters.
    pub fn new(params: ClusterParams) -> Self {
        Self { params }
    }

    /// Current parameters.
    pub fn params(&self) -> &ClusterParams {
        &self.params
    }

    /// Replace the parameters (the adaptive controller retunes tolerance
    /// and lambda every frame).
    pub fn set_params(&mut self, params: ClusterParams) {
        self.params = params;
    }

    /// Segment a cloud into Euclidean clusters.
    ///
    /// Single-linkage flood fill over a k-d tree radius query. Clusters
    /// failing the point-count or bounding-box gates are discarded.
    /// Deterministic: seeds are visited in point order and neighbor
    /// expansion is ordered by index.
    pub fn detect(&self, cloud: &FeatureCloud) -> Vec<Cluster> {
        if cloud.len() < self.params.min_pts {
            return Vec::new();
        }

        let mut tree: KdTree<f32, 3> = KdTree::new();
        for (i, p) in cloud.iter().enumerate() {
            tree.add(&[p.x, p.y, p.z], i as u64);
        }

        let tolerance_sq = self.params.tolerance * self.params.tolerance;
        let mut visited = vec![false; cloud.len()];
        let mut clusters = Vec::new();

        for seed in 0..cloud.len() {
            if visited[seed] {
                continue;
            }
            visited[seed] = true;

            let mut members = vec![seed];
            let mut frontier = vec![seed];
            while let Some(current) = frontier.pop() {
                let p = &cloud.points[current];
                let mut neighbors: Vec<usize> = tree
                    .within_unsorted::<SquaredEuclidean>(&[p.x, p.y, p.z], tolerance_sq)
                    .into_iter()
                    .map(|n| n.item as usize)
                    .collect();
                neighbors.sort_unstable();
                for neighbor in neighbors {
                    if !visited[neighbor] {
                        visited[neighbor] = true;
                        members.push(neighbor);
                        frontier.push(neighbor);
                    }
                }
            }

            if members.len() < self.params.min_pts || members.len() > self.params.max_pts {
                continue;
            }
            if let Some(cluster) = self.make_cluster(cloud, &members) {
                clusters.push(cluster);
            }
        }

        clusters
    }

    /// Build a cluster from member indices, applying the size gates.
    fn make_cluster(&self, cloud: &FeatureCloud, members: &[usize]) -> Option<Cluster> {
        let mut min_pt = Vector3::repeat(f64::INFINITY);
        let mut max_pt = Vector3::repeat(f64::NEG_INFINITY);
        let mut member_cloud = FeatureCloud::with_capacity(members.len());

        for &i in members {
            let p = cloud.points[i];
            let pos = p.position();
            min_pt = min_pt.inf(&pos);
            max_pt = max_pt.sup(&pos);
            member_cloud.push(p);
        }

        let size = max_pt - min_pt;
        let extent = size.max();
        if extent < f64::from(self.params.min_size) || extent > f64::from(self.params.max_size) {
            return None;
        }

        let centroid = member_cloud.centroid();
        let is_human = self.looks_human(&size);

        Some(Cluster {
            min_pt,
            max_pt,
            size,
            centroid,
            is_human,
            cloud: member_cloud,
        })
    }

    /// Tall-and-narrow heuristic combining aspect ratio and footprint,
    /// weighted by lambda.
    ///
    /// A standing person is much taller than wide and occupies a small
    /// footprint; lambda scales how quickly a large footprint disqualifies
    /// a cluster.
    fn looks_human(&self, size: &Vector3<f64>) -> bool {
        if !(0.6..=2.2).contains(&size.z) {
            return false;
        }
        let lambda = f64::from(self.params.lambda);
        let footprint = size.x.hypot(size.y);
        let tallness = size.z / footprint.max(1e-3);
        let compactness = lambda / (lambda + footprint);
        tallness * compactness > 1.0
    }
}
