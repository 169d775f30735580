//! Configuration loading for SthiraSLAM.

use crate::error::{Result, SthiraError};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure.
#[derive(Clone, Debug, Deserialize)]
pub struct MapperConfig {
    /// Initial edge-feature voxel leaf size in meters
    #[serde(default = "default_line_resolution")]
    pub mapping_line_resolution: f32,

    /// Initial planar-feature voxel leaf size in meters
    #[serde(default = "default_plane_resolution")]
    pub mapping_plane_resolution: f32,

    /// Initial dynamic-speed threshold
    #[serde(default = "default_max_object_speed")]
    pub max_object_speed: f32,

    /// Initial dynamic-displacement threshold
    #[serde(default = "default_max_class_dist")]
    pub max_class_dist: f32,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub auto_mapping: AutoMappingConfig,

    /// If false, dynamic clusters are still detected and published but the
    /// stack is never mutated
    #[serde(default = "default_true")]
    pub remove_enable: bool,

    /// Lower ground-cut bound in sensor-frame meters
    #[serde(default = "default_lidar_min_z")]
    pub lidar_min_z: f32,

    /// Upper ground-cut bound in sensor-frame meters
    #[serde(default = "default_lidar_max_z")]
    pub lidar_max_z: f32,

    /// Bound on each staged input queue (oldest entries are evicted)
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Cluster detection gates.
#[derive(Clone, Debug, Deserialize)]
pub struct ClusterConfig {
    /// Minimum points for a cluster to be kept
    #[serde(default = "default_cluster_min_pts")]
    pub min_pts: usize,

    /// Maximum points for a cluster to be kept
    #[serde(default = "default_cluster_max_pts")]
    pub max_pts: usize,

    /// Minimum bounding-box extent in meters
    #[serde(default = "default_cluster_min_size")]
    pub min_size: f32,

    /// Maximum bounding-box extent in meters
    #[serde(default = "default_cluster_max_size")]
    pub max_size: f32,

    /// Euclidean clustering radius in meters
    #[serde(default = "default_cluster_tolerance")]
    pub tolerance: f32,

    /// Human-shape heuristic weight
    #[serde(default = "default_cluster_lambda")]
    pub lambda: f32,
}

/// Adaptive resolution control.
#[derive(Clone, Debug, Deserialize)]
pub struct AutoMappingConfig {
    /// Enable the per-frame resolution feedback loop
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Target per-frame wall time in milliseconds
    #[serde(default = "default_auto_mapping_time")]
    pub target_time_ms: f32,

    /// Target cluster count (reserved, currently unused)
    #[serde(default = "default_auto_cluster_number")]
    pub cluster_number: usize,
}

/// Output file configuration. `None` disables the corresponding sink.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OutputConfig {
    /// Trajectory file path (one re-axed 3×4 matrix row per frame)
    #[serde(default)]
    pub trajectory_path: Option<String>,

    /// Removal-stage timing file path (one duration in ms per frame)
    #[serde(default)]
    pub timing_path: Option<String>,
}

// Default value functions
fn default_line_resolution() -> f32 {
    0.1
}
fn default_plane_resolution() -> f32 {
    0.1
}
fn default_max_object_speed() -> f32 {
    0.2
}
fn default_max_class_dist() -> f32 {
    0.1
}
fn default_cluster_min_pts() -> usize {
    8
}
fn default_cluster_max_pts() -> usize {
    8192
}
fn default_cluster_min_size() -> f32 {
    0.2
}
fn default_cluster_max_size() -> f32 {
    20.0
}
fn default_cluster_tolerance() -> f32 {
    0.2
}
fn default_cluster_lambda() -> f32 {
    20.0
}
fn default_auto_mapping_time() -> f32 {
    400.0
}
fn default_auto_cluster_number() -> usize {
    100
}
fn default_lidar_min_z() -> f32 {
    -1.73
}
fn default_lidar_max_z() -> f32 {
    3.44
}
fn default_queue_capacity() -> usize {
    100
}
fn default_true() -> bool {
    true
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            min_pts: default_cluster_min_pts(),
            max_pts: default_cluster_max_pts(),
            min_size: default_cluster_min_size(),
            max_size: default_cluster_max_size(),
            tolerance: default_cluster_tolerance(),
            lambda: default_cluster_lambda(),
        }
    }
}

impl Default for AutoMappingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_time_ms: default_auto_mapping_time(),
            cluster_number: default_auto_cluster_number(),
        }
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            mapping_line_resolution: default_line_resolution(),
            mapping_plane_resolution: default_plane_resolution(),
            max_object_speed: default_max_object_speed(),
            max_class_dist: default_max_class_dist(),
            cluster: ClusterConfig::default(),
            auto_mapping: AutoMappingConfig::default(),
            remove_enable: true,
            lidar_min_z: default_lidar_min_z(),
            lidar_max_z: default_lidar_max_z(),
            queue_capacity: default_queue_capacity(),
            output: OutputConfig::default(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SthiraError::Config(format!("Failed to read config file: {}", e)))?;
        let config: MapperConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the mapping loop cannot run with.
    ///
    /// Out-of-range values here are fatal at startup; nothing inside the
    /// loop is allowed to terminate the process later.
    pub fn validate(&self) -> Result<()> {
        if self.mapping_line_resolution <= 0.0 || self.mapping_plane_resolution <= 0.0 {
            return Err(SthiraError::Config(
                "voxel resolutions must be positive".into(),
            ));
        }
        if self.lidar_min_z >= self.lidar_max_z {
            return Err(SthiraError::Config(format!(
                "inverted lidar z bounds: [{}, {}]",
                self.lidar_min_z, self.lidar_max_z
            )));
        }
        if self.cluster.min_pts > self.cluster.max_pts {
            return Err(SthiraError::Config(
                "cluster point gates inverted (min_pts > max_pts)".into(),
            ));
        }
        if self.cluster.min_size >= self.cluster.max_size || self.cluster.min_size < 0.0 {
            return Err(SthiraError::Config(
                "cluster size gates must satisfy 0 <= min_size < max_size".into(),
            ));
        }
        if self.cluster.tolerance <= 0.0 {
            return Err(SthiraError::Config(
                "cluster tolerance must be positive".into(),
            ));
        }
        if self.max_object_speed < 0.0 || self.max_class_dist < 0.0 {
            return Err(SthiraError::Config(
                "dynamic thresholds must be non-negative".into(),
            ));
        }
        if self.auto_mapping.enabled && self.auto_mapping.target_time_ms <= 0.0 {
            return Err(SthiraError::Config(
                "auto_mapping target time must be positive".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(SthiraError::Config(
                "queue capacity must be at least one".into(),
            ));
        }
        Ok(())
    }
}
