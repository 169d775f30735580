//! Core data types shared across the crate.

mod accumulator;
mod point;
mod pose;
mod timestamped;

pub use accumulator::Accumulator;
pub use point::{FeatureCloud, FeaturePoint, EDGE_CURVATURE_THRESHOLD};
pub use pose::Pose3D;
pub use timestamped::Timestamped;
