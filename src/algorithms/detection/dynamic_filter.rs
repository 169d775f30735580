//! Dynamic-object scoring, adaptive thresholds and exclusion-box removal.
//!
//! A cluster is declared dynamic when either its tracker speed ratio or its
//! neighbor-displacement ratio exceeds the current adaptive threshold. Both
//! thresholds are re-derived every frame as half the running mean of the
//! corresponding statistic — a low-pass over all history, so a few noisy
//! frames cannot blow the gate open. This halving is intentional, not a
//! damping bug.

use log::debug;
use nalgebra::Vector3;

use crate::core::types::{Accumulator, FeatureCloud, Pose3D};

use super::clustering::Cluster;
use super::tracker::{ClusterTracker, TrackerParams};

/// Result of one frame's dynamic-object pass.
#[derive(Debug, Default)]
pub struct DynamicOutcome {
    /// World-frame points of clusters flagged dynamic this frame
    pub dynamic_cloud: FeatureCloud,
    /// Clusters observed this frame
    pub cluster_count: usize,
    /// Clusters paired with a track this frame
    pub association_count: usize,
    /// Clusters that crossed a dynamic threshold
    pub dynamic_count: usize,
}

/// Dynamic-object detector and remover.
#[derive(Debug)]
pub struct DynamicFilter {
    tracker: ClusterTracker,
    /// Running displacement-ratio statistics over all clusters ever scored
    displacement_stats: Accumulator,
    /// Running speed-ratio statistics over all associations ever made
    speed_stats: Accumulator,
    max_object_speed: f64,
    max_class_dist: f64,
    remove_enable: bool,
}

impl DynamicFilter {
    /// Create a filter.
    ///
    /// `max_object_speed` / `max_class_dist` seed the thresholds until the
    /// accumulators have seen real data; the statistic accumulators are
    /// seeded with one prior sample each so the adaptive thresholds are
    /// defined from the first frame.
    pub fn new(
        tracker_params: TrackerParams,
        max_object_speed: f64,
        max_class_dist: f64,
        remove_enable: bool,
    ) -> Self {
        Self {
            tracker: ClusterTracker::new(tracker_params),
            displacement_stats: Accumulator::with_prior(0.3),
            speed_stats: Accumulator::with_prior(0.2),
            max_object_speed,
            max_class_dist,
            remove_enable,
        }
    }

    /// Current speed threshold.
    pub fn max_object_speed(&self) -> f64 {
        self.max_object_speed
    }

    /// Current displacement threshold.
    pub fn max_class_dist(&self) -> f64 {
        self.max_class_dist
    }

    /// Access the underlying tracker.
    pub fn tracker(&self) -> &ClusterTracker {
        &self.tracker
    }

    /// Run the full detect / track / associate / remove pass.
    ///
    /// `clusters` are world-frame detections for this frame; `world_stack`
    /// is the combined world-frame feature stack that insertion will read
    /// afterwards. `ground_stddev` pads every face of each exclusion box.
    pub fn process(
        &mut self,
        time_us: u64,
        clusters: &mut [Cluster],
        world_stack: &mut FeatureCloud,
        pose: &Pose3D,
        ground_stddev: f64,
    ) -> DynamicOutcome {
        let mut outcome = DynamicOutcome {
            cluster_count: clusters.len(),
            ..DynamicOutcome::default()
        };

        // Displacement score per cluster: mean recorded neighbor
        // displacement over the members, normalized by sensor range.
        let scores: Vec<f64> = clusters
            .iter()
            .map(|cluster| {
                let score = displacement_score(cluster, pose);
                self.displacement_stats.add(score);
                score
            })
            .collect();

        self.tracker.predict(time_us);
        let associations = self.tracker.correct(time_us, clusters);
        outcome.association_count = associations.len();

        let mut speeds = Vec::with_capacity(associations.len());
        for assoc in &associations {
            let track = &self.tracker.tracks()[assoc.track];
            let cluster = &mut clusters[assoc.observation];
            let range = sensor_range(&cluster.centroid, pose);
            let speed = track.velocity().norm() / range;
            self.speed_stats.add(speed);
            speeds.push(speed);

            // Annotate associated members with the cluster's displacement
            // score for downstream inspection of the dynamic cloud.
            let score = scores[assoc.observation] as f32;
            for point in cluster.cloud.points.iter_mut() {
                point.intensity = score;
            }
        }

        self.max_object_speed = self.speed_stats.mean() / 2.0;
        self.max_class_dist = self.displacement_stats.mean() / 2.0;

        for (assoc, speed) in associations.iter().zip(&speeds) {
            let cluster = &clusters[assoc.observation];
            let score = scores[assoc.observation];
            if *speed <= self.max_object_speed && score <= self.max_class_dist {
                continue;
            }
            outcome.dynamic_count += 1;
            outcome.dynamic_cloud.extend_from(&cluster.cloud);

            if self.remove_enable {
                let min = cluster.min_pt - Vector3::repeat(ground_stddev);
                let max = cluster.max_pt + Vector3::repeat(ground_stddev);
                // Keep a point when any coordinate falls outside the box.
                world_stack.retain(|p| {
                    let pos = p.position();
                    pos.x < min.x
                        || pos.x > max.x
                        || pos.y < min.y
                        || pos.y > max.y
                        || pos.z < min.z
                        || pos.z > max.z
                });
            }
        }

        debug!(
            "{} clusters, {} tracked, {} dynamic (speed > {:.3} or dist > {:.3})",
            outcome.cluster_count,
            outcome.association_count,
            outcome.dynamic_count,
            self.max_object_speed,
            self.max_class_dist
        );
        outcome
    }
}

/// Sensor-frame range of a world-frame point, floored away from zero.
fn sensor_range(world_point: &Vector3<f64>, pose: &Pose3D) -> f64 {
    pose.inverse_transform_point(world_point).norm().max(1e-6)
}

/// `||mean recorded neighbor displacement|| / ||centroid in sensor frame||`.
fn displacement_score(cluster: &Cluster, pose: &Pose3D) -> f64 {
    let mut mean_normal = [Accumulator::new(), Accumulator::new(), Accumulator::new()];
    for point in cluster.cloud.iter() {
        for (axis, acc) in mean_normal.iter_mut().enumerate() {
            acc.add(f64::from(point.normal[axis]));
        }
    }
    let magnitude = (mean_normal[0].mean().powi(2)
        + mean_normal[1].mean().powi(2)
        + mean_normal[2].mean().powi(2))
    .sqrt();
    magnitude / sensor_range(&cluster.centroid, pose)
}
