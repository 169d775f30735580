//! Output facade for the mapping pipeline.
//!
//! The transport layer implements [`MappingSink`]; the mapper calls it
//! with every publication from a single thread. All methods default to
//! no-ops so a sink only implements what it consumes.
//!
//! The one output that does not flow through the sink is the
//! odometry-rate refined pose: producers derive it inline from
//! [`crate::engine::CorrectionLink::refine_odometry`] without waking the
//! mapping thread.

use crate::core::types::{FeatureCloud, Pose3D, Timestamped};

/// Receiver for everything the mapping pipeline publishes.
#[allow(unused_variables)]
pub trait MappingSink {
    /// Refined pose, once per processed frame.
    fn on_refined_pose(&mut self, pose: &Timestamped<Pose3D>) {}

    /// Growing corrected trajectory, once per processed frame.
    fn on_trajectory(&mut self, trajectory: &[Timestamped<Pose3D>]) {}

    /// Map-frame-to-sensor-frame transform, once per processed frame.
    fn on_map_to_sensor(&mut self, transform: &Timestamped<Pose3D>) {}

    /// Registered full-resolution cloud in the map frame, every frame.
    fn on_registered_cloud(&mut self, cloud: &FeatureCloud, time_us: u64) {}

    /// World-frame points of this frame's dynamic clusters, every frame.
    fn on_dynamic_cloud(&mut self, cloud: &FeatureCloud, time_us: u64) {}

    /// Feature cloud of the 3×3×3 surround window, every 5 frames.
    fn on_surround_cloud(&mut self, cloud: &FeatureCloud, time_us: u64) {}

    /// Whole cube-map contents, every 20 frames.
    fn on_map_cloud(&mut self, cloud: &FeatureCloud, time_us: u64) {}

    /// Cumulative static map, every 20 frames.
    fn on_static_map(&mut self, cloud: &FeatureCloud, time_us: u64) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MappingSink for NullSink {}
