//! Scan-to-map pose refinement.
//!
//! Two outer iterations: each rebuilds the feature-to-map correspondence
//! set against the current pose estimate and runs a short Gauss-Newton
//! solve (at most four inner iterations) with a Huber-robust loss over a
//! unit-quaternion parameterization.

pub mod correspondence;
mod gauss_newton;
mod robust_kernels;

pub use correspondence::{
    EdgeCorrespondence, FeatureIndex, PlaneCorrespondence, MAX_NEIGHBOR_SQ_DIST, NEIGHBOR_COUNT,
};
pub use gauss_newton::{solve_pose, SolveReport};
pub use robust_kernels::RobustKernel;

use log::debug;

use crate::core::types::{Accumulator, FeatureCloud, Pose3D};

/// Scan-to-map matcher configuration.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Correspondence-rebuild iterations
    pub outer_iterations: u32,
    /// Gauss-Newton steps per correspondence set
    pub inner_iterations: u32,
    /// Robust loss applied to every residual
    pub kernel: RobustKernel,
    /// Robust loss scale in meters
    pub kernel_scale: f64,
    /// Minimum edge-slab size for the solve to run
    pub min_edge_map_points: usize,
    /// Minimum plane-slab size for the solve to run
    pub min_plane_map_points: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            outer_iterations: 2,
            inner_iterations: 4,
            kernel: RobustKernel::Huber,
            kernel_scale: 0.1,
            min_edge_map_points: 10,
            min_plane_map_points: 50,
        }
    }
}

/// Outcome of one frame's refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The pose was refined against the map
    Refined {
        /// Accepted line constraints in the final outer iteration
        edge_count: usize,
        /// Accepted plane constraints in the final outer iteration
        plane_count: usize,
    },
    /// The working slab was too small; the pose is the odometry guess
    InsufficientMap,
    /// The slab was large enough but produced no accepted correspondences
    NoCorrespondences,
}

impl MatchOutcome {
    /// True when a solve actually ran.
    pub fn refined(&self) -> bool {
        matches!(self, MatchOutcome::Refined { .. })
    }
}

/// Running statistics threaded through the association passes.
pub struct AssociationStats<'a> {
    /// Per-frame ground-level z accumulator
    pub ground_level: &'a mut Accumulator,
    /// Persistent edge neighbor-displacement statistics
    pub edge_displacement: &'a mut Accumulator,
    /// Persistent plane neighbor-displacement statistics
    pub plane_displacement: &'a mut Accumulator,
}

/// Scan-to-map matcher.
#[derive(Debug, Clone, Default)]
pub struct ScanToMapMatcher {
    config: MatcherConfig,
}

impl ScanToMapMatcher {
    /// Create a matcher with the given configuration.
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Refine `pose` so the stacks align with the map slabs.
    ///
    /// Builds one k-d tree per slab, then alternates correspondence
    /// rebuilds with bounded Gauss-Newton solves. The stacks are mutated:
    /// every point's normal slot receives its mean neighbor displacement.
    /// On [`MatchOutcome::InsufficientMap`] or
    /// [`MatchOutcome::NoCorrespondences`] the pose is left untouched.
    pub fn refine(
        &self,
        pose: &mut Pose3D,
        edge_stack: &mut FeatureCloud,
        plane_stack: &mut FeatureCloud,
        edge_map: &FeatureCloud,
        plane_map: &FeatureCloud,
        stats: &mut AssociationStats<'_>,
    ) -> MatchOutcome {
        if edge_map.len() <= self.config.min_edge_map_points
            || plane_map.len() <= self.config.min_plane_map_points
        {
            return MatchOutcome::InsufficientMap;
        }

        let edge_index = FeatureIndex::build(edge_map);
        let plane_index = FeatureIndex::build(plane_map);

        let mut edges = Vec::with_capacity(edge_stack.len());
        let mut planes = Vec::with_capacity(plane_stack.len());

        for outer in 0..self.config.outer_iterations {
            edges.clear();
            planes.clear();

            correspondence::associate_edges(
                edge_stack,
                edge_map,
                &edge_index,
                pose,
                stats.ground_level,
                stats.edge_displacement,
                &mut edges,
            );
            correspondence::associate_planes(
                plane_stack,
                plane_map,
                &plane_index,
                pose,
                stats.ground_level,
                stats.plane_displacement,
                &mut planes,
            );

            if edges.is_empty() && planes.is_empty() {
                return MatchOutcome::NoCorrespondences;
            }

            let report = solve_pose(
                pose,
                &edges,
                &planes,
                self.config.kernel,
                self.config.kernel_scale,
                self.config.inner_iterations,
            );
            debug!(
                "outer {}: {} edge / {} plane constraints, {} solver iterations",
                outer,
                edges.len(),
                planes.len(),
                report.iterations
            );
        }

        MatchOutcome::Refined {
            edge_count: edges.len(),
            plane_count: planes.len(),
        }
    }
}
