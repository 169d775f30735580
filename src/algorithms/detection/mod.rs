//! Dynamic-object detection: clustering, tracking, removal.

mod clustering;
mod dynamic_filter;
mod tracker;

pub use clustering::{Cluster, ClusterDetector, ClusterParams};
pub use dynamic_filter::{DynamicFilter, DynamicOutcome};
pub use tracker::{Association, ClusterTracker, Track, TrackerParams};
