//! SthiraSLAM - LiDAR scan-to-map odometry with dynamic-object removal
//!
//! A LOAM-style mapping back-end: it refines a coarse odometry pose
//! against a persistent cube-sharded feature map, detects and removes
//! returns from moving objects (primarily people), and integrates only the
//! static remainder. "Sthira" is Sanskrit for steady — the map keeps what
//! does not move.
//!
//! # Architecture
//!
//! The crate is organized into 4 logical layers:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      io/                            │  ← Infrastructure
//! │        (sink facade, trajectory/timing files)       │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                    engine/                          │  ← Orchestration
//! │   (cube map, staging, adaptive control, mapper)     │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                  algorithms/                        │  ← Core algorithms
//! │        (filtering, matching, detection)             │
//! └─────────────────────────────────────────────────────┘
//!                          │
//! ┌─────────────────────────────────────────────────────┐
//! │                     core/                           │  ← Foundation
//! │                (types, math)                        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Per-frame data flow
//!
//! Staged inputs → time alignment → initial pose through the correction
//! link → cube recentering → k-d tree build over the 3×3×3 slab →
//! edge/plane residual assembly → Gauss-Newton refinement → link update →
//! ground-aware clustering → tracker predict/correct → dynamic box
//! removal → curvature re-split → cube insertion → per-cube voxel filter
//! → publication.
//!
//! # Threading
//!
//! One consumer thread runs [`Mapper::run`]; any number of transport
//! callbacks push into [`InputStaging`] and read the low-latency pose from
//! [`CorrectionLink::refine_odometry`]. Producers never touch the map.

// ============================================================================
// Layer 1: Core foundation (no internal deps)
// ============================================================================
pub mod core;

// ============================================================================
// Layer 2: Algorithms (depends on core)
// ============================================================================
pub mod algorithms;

// ============================================================================
// Layer 3: Engine (depends on core, algorithms)
// ============================================================================
pub mod engine;

// ============================================================================
// Layer 4: I/O infrastructure (depends on all layers)
// ============================================================================
pub mod io;

pub mod config;
pub mod error;

// ============================================================================
// Convenience re-exports (flat namespace for common use)
// ============================================================================

// Core types
pub use crate::core::types::{Accumulator, FeatureCloud, FeaturePoint, Pose3D, Timestamped};

// Algorithms
pub use algorithms::detection::{
    Cluster, ClusterDetector, ClusterParams, ClusterTracker, DynamicFilter, TrackerParams,
};
pub use algorithms::filtering::VoxelGrid;
pub use algorithms::matching::{MatchOutcome, MatcherConfig, RobustKernel, ScanToMapMatcher};

// Engine
pub use engine::{
    CorrectionLink, CubeMap, FrameSummary, InputStaging, Mapper, ResolutionController,
    ShutdownFlag, StagedFrame,
};

// I/O
pub use io::{MappingSink, NullSink, TimingWriter, TrajectoryWriter};

// Configuration and errors
pub use config::MapperConfig;
pub use error::{Result, SthiraError};
