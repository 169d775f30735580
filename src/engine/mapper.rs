//! The per-frame mapping pipeline and its consumer loop.
//!
//! Owns every piece of persistent state: the refined pose, the correction
//! link, the cube map, the tracker, the accumulators and the adaptive
//! controller. Constructed once at startup; producers only ever touch the
//! [`InputStaging`] handle and the [`CorrectionLink`] snapshot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::algorithms::detection::{ClusterDetector, ClusterParams, DynamicFilter, TrackerParams};
use crate::algorithms::filtering::{filter_z, VoxelGrid};
use crate::algorithms::matching::{AssociationStats, MatchOutcome, ScanToMapMatcher};
use crate::config::MapperConfig;
use crate::core::types::{Accumulator, FeatureCloud, Pose3D, Timestamped};
use crate::error::Result;
use crate::io::{MappingSink, TimingWriter, TrajectoryWriter};

use super::adaptive::ResolutionController;
use super::cube_map::CubeMap;
use super::shared::{CorrectionLink, ShutdownFlag};
use super::staging::{InputStaging, StagedFrame};

/// Surround-cloud publication period in frames.
const SURROUND_PERIOD: u64 = 5;
/// Whole-map publication period in frames.
const MAP_PERIOD: u64 = 20;
/// Idle poll interval of the consumer loop.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// What happened in one processed frame; returned for observability and
/// heavily used by the scenario tests.
#[derive(Debug, Clone)]
pub struct FrameSummary {
    /// Frame timestamp
    pub time_us: u64,
    /// Refined world pose after this frame
    pub pose: Pose3D,
    /// How the solve ended
    pub outcome: MatchOutcome,
    /// Clusters detected this frame
    pub cluster_count: usize,
    /// Clusters associated with tracks
    pub association_count: usize,
    /// Clusters flagged dynamic
    pub dynamic_count: usize,
    /// Down-sampled edge stack size
    pub edge_stack_len: usize,
    /// Down-sampled plane stack size
    pub plane_stack_len: usize,
    /// Wall time of the removal stage in ms
    pub removal_ms: f64,
    /// Whole-frame wall time in ms
    pub whole_ms: f64,
}

/// The mapping pipeline.
pub struct Mapper {
    config: MapperConfig,
    matcher: ScanToMapMatcher,
    map: CubeMap,
    detector: ClusterDetector,
    dynamic: DynamicFilter,
    controller: ResolutionController,
    edge_filter: VoxelGrid,
    plane_filter: VoxelGrid,
    static_map: FeatureCloud,
    link: Arc<CorrectionLink>,
    pose: Pose3D,
    trajectory: Vec<Timestamped<Pose3D>>,
    edge_displacement: Accumulator,
    plane_displacement: Accumulator,
    removal_time: Accumulator,
    frame_count: u64,
    trajectory_writer: Option<TrajectoryWriter>,
    timing_writer: Option<TimingWriter>,
}

impl Mapper {
    /// Build a mapper from a validated configuration.
    ///
    /// Configuration errors are fatal here; output-file failures are not —
    /// the corresponding sink is disabled with an error log and the
    /// mapping loop runs without it.
    pub fn new(config: MapperConfig) -> Result<Self> {
        config.validate()?;

        let trajectory_writer = config.output.trajectory_path.as_ref().and_then(|path| {
            match TrajectoryWriter::create(std::path::Path::new(path)) {
                Ok(writer) => Some(writer),
                Err(e) => {
                    error!("cannot open trajectory file {}: {}", path, e);
                    None
                }
            }
        });
        let timing_writer = config.output.timing_path.as_ref().and_then(|path| {
            match TimingWriter::create(std::path::Path::new(path)) {
                Ok(writer) => Some(writer),
                Err(e) => {
                    error!("cannot open timing file {}: {}", path, e);
                    None
                }
            }
        });

        let detector = ClusterDetector::new(ClusterParams {
            tolerance: config.cluster.tolerance,
            min_pts: config.cluster.min_pts,
            max_pts: config.cluster.max_pts,
            min_size: config.cluster.min_size,
            max_size: config.cluster.max_size,
            lambda: config.cluster.lambda,
        });
        let dynamic = DynamicFilter::new(
            TrackerParams::default(),
            f64::from(config.max_object_speed),
            f64::from(config.max_class_dist),
            config.remove_enable,
        );
        let controller = ResolutionController::new(
            config.auto_mapping.enabled,
            config.auto_mapping.target_time_ms,
            config.mapping_line_resolution,
            config.mapping_plane_resolution,
        );

        Ok(Self {
            edge_filter: VoxelGrid::new(config.mapping_line_resolution),
            plane_filter: VoxelGrid::new(config.mapping_plane_resolution),
            matcher: ScanToMapMatcher::default(),
            map: CubeMap::new(),
            detector,
            dynamic,
            controller,
            static_map: FeatureCloud::new(),
            link: Arc::new(CorrectionLink::new()),
            pose: Pose3D::identity(),
            trajectory: Vec::new(),
            edge_displacement: Accumulator::with_prior(1.0),
            plane_displacement: Accumulator::with_prior(0.2),
            removal_time: Accumulator::new(),
            frame_count: 0,
            trajectory_writer,
            timing_writer,
            config,
        })
    }

    /// Handle producers use for the odometry-rate pose path.
    pub fn correction_link(&self) -> Arc<CorrectionLink> {
        Arc::clone(&self.link)
    }

    /// The validated configuration this mapper was built from.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Current refined world pose.
    pub fn pose(&self) -> &Pose3D {
        &self.pose
    }

    /// The corrected trajectory so far.
    pub fn trajectory(&self) -> &[Timestamped<Pose3D>] {
        &self.trajectory
    }

    /// The persistent cube map.
    pub fn map(&self) -> &CubeMap {
        &self.map
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Current adaptive leaf sizes `(line, plane)`.
    pub fn resolutions(&self) -> (f32, f32) {
        (self.controller.line_res(), self.controller.plane_res())
    }

    /// Consumer loop: drain staged frames until shutdown is requested.
    ///
    /// Blocks only on the staging mutex and a 2 ms sleep between empty
    /// polls. Nothing in here may terminate the process.
    pub fn run(
        &mut self,
        staging: &InputStaging,
        sink: &mut dyn MappingSink,
        shutdown: &ShutdownFlag,
    ) {
        info!("mapping loop started");
        loop {
            if shutdown.is_requested() {
                break;
            }
            match staging.try_take_frame() {
                Some(frame) => {
                    self.process_frame(frame, sink);
                }
                None => std::thread::sleep(POLL_INTERVAL),
            }
        }
        self.flush();
        info!("mapping loop stopped");
    }

    /// Flush file sinks and report the removal-time summary.
    pub fn flush(&mut self) {
        if let Some(writer) = self.trajectory_writer.as_mut() {
            if let Err(e) = writer.flush() {
                error!("trajectory flush failed: {}", e);
            }
        }
        if let Some(writer) = self.timing_writer.as_mut() {
            if let Err(e) = writer.flush() {
                error!("timing flush failed: {}", e);
            }
        }
        info!(
            "removal time over {} frames: mean {:.3} ms, stddev {:.3} ms, min {:.3} ms, max {:.3} ms",
            self.removal_time.count(),
            self.removal_time.mean(),
            self.removal_time.stddev(),
            self.removal_time.min(),
            self.removal_time.max()
        );
    }

    /// Process one time-aligned frame.
    pub fn process_frame(&mut self, frame: StagedFrame, sink: &mut dyn MappingSink) -> FrameSummary {
        let whole_start = Instant::now();

        // Initial guess from the upstream odometry through the link.
        self.pose = self.link.snapshot().compose(&frame.odometry);

        let shift_start = Instant::now();
        let sensor_cube = self.map.recenter(&self.pose.translation);
        let window = self.map.window_indices(sensor_cube);
        let edge_map = self.map.edge_slab(&window);
        let plane_map = self.map.plane_slab(&window);

        let mut edge_stack = self.edge_filter.filter(&frame.corner);
        let mut plane_stack = self.plane_filter.filter(&frame.surf);
        let edge_stack_len = edge_stack.len();
        let plane_stack_len = plane_stack.len();
        debug!(
            "map prepare {:.3} ms, slab {} edges / {} planes, stack {} / {}",
            shift_start.elapsed().as_secs_f64() * 1e3,
            edge_map.len(),
            plane_map.len(),
            edge_stack_len,
            plane_stack_len
        );

        let mut ground_level = Accumulator::new();
        let solve_start = Instant::now();
        let outcome = self.matcher.refine(
            &mut self.pose,
            &mut edge_stack,
            &mut plane_stack,
            &edge_map,
            &plane_map,
            &mut AssociationStats {
                ground_level: &mut ground_level,
                edge_displacement: &mut self.edge_displacement,
                plane_displacement: &mut self.plane_displacement,
            },
        );
        match outcome {
            MatchOutcome::Refined { .. } => {
                // Re-establish T_w_curr = T_wmap_wodom ∘ T_wodom_curr.
                self.link.store(self.pose.compose(&frame.odometry.inverse()));
            }
            MatchOutcome::InsufficientMap => {
                warn!("map corner and surf counts not enough, skipping optimization");
            }
            MatchOutcome::NoCorrespondences => {
                warn!("no accepted correspondences, keeping odometry pose");
            }
        }
        debug!(
            "optimization {:.3} ms ({:?}), edge displacement {:.3}±{:.3} m, plane {:.3}±{:.3} m",
            solve_start.elapsed().as_secs_f64() * 1e3,
            outcome,
            self.edge_displacement.mean(),
            self.edge_displacement.stddev(),
            self.plane_displacement.mean(),
            self.plane_displacement.stddev()
        );

        // Dynamic-object stage on the combined stack.
        let removal_start = Instant::now();
        let mut combined_sensor = FeatureCloud::with_capacity(edge_stack.len() + plane_stack.len());
        combined_sensor.extend_from(&edge_stack);
        combined_sensor.extend_from(&plane_stack);

        let cut_min = (self.config.lidar_min_z + ground_level.mean() as f32) / 2.0;
        let cluster_input_sensor = filter_z(&combined_sensor, cut_min, self.config.lidar_max_z);

        // Lift both stacks to the world frame, tagging each point's
        // intensity with its sensor-frame height.
        let lift = |p: &crate::core::types::FeaturePoint| {
            let mut world = self.pose.transform_feature(p);
            world.intensity = p.z;
            world
        };
        let mut world_stack: FeatureCloud = combined_sensor.iter().map(lift).collect();
        let cluster_input: FeatureCloud = cluster_input_sensor.iter().map(lift).collect();

        let mut clusters = self.detector.detect(&cluster_input);
        let dynamic_outcome = self.dynamic.process(
            frame.time_us,
            &mut clusters,
            &mut world_stack,
            &self.pose,
            ground_level.stddev(),
        );

        let removal_ms = removal_start.elapsed().as_secs_f64() * 1e3;
        self.removal_time.add(removal_ms);
        if let Some(writer) = self.timing_writer.as_mut() {
            if let Err(e) = writer.write_ms(removal_ms) {
                error!("timing write failed: {}", e);
            }
        }

        // Cumulative static map for visualization.
        self.static_map.extend_from(&world_stack);
        self.static_map = self.edge_filter.filter(&self.static_map);

        // Re-split the filtered stack by curvature and grow the cube map.
        let insert_start = Instant::now();
        for point in world_stack.iter() {
            if point.is_edge() {
                self.map.insert_edge(*point);
            } else {
                self.map.insert_plane(*point);
            }
        }
        self.map
            .filter_window(&window, &self.edge_filter, &self.plane_filter);
        debug!(
            "insert + cube filter {:.3} ms",
            insert_start.elapsed().as_secs_f64() * 1e3
        );

        self.publish(&frame, &dynamic_outcome.dynamic_cloud, &window, sink);

        let whole_ms = whole_start.elapsed().as_secs_f64() * 1e3;
        self.adapt(whole_ms, edge_stack_len, plane_stack_len);
        self.frame_count += 1;

        FrameSummary {
            time_us: frame.time_us,
            pose: self.pose,
            outcome,
            cluster_count: dynamic_outcome.cluster_count,
            association_count: dynamic_outcome.association_count,
            dynamic_count: dynamic_outcome.dynamic_count,
            edge_stack_len,
            plane_stack_len,
            removal_ms,
            whole_ms,
        }
    }

    /// Emit every per-frame and periodic publication.
    fn publish(
        &mut self,
        frame: &StagedFrame,
        dynamic_cloud: &FeatureCloud,
        window: &[usize],
        sink: &mut dyn MappingSink,
    ) {
        let time_us = frame.time_us;

        if self.frame_count % SURROUND_PERIOD == 0 {
            sink.on_surround_cloud(&self.map.collect_window(window), time_us);
        }
        if self.frame_count % MAP_PERIOD == 0 {
            sink.on_map_cloud(&self.map.collect_all(), time_us);
            sink.on_static_map(&self.static_map, time_us);
        }

        let registered: FeatureCloud = frame
            .full
            .iter()
            .map(|p| self.pose.transform_feature(p))
            .collect();
        sink.on_registered_cloud(&registered, time_us);
        sink.on_dynamic_cloud(dynamic_cloud, time_us);

        let stamped = Timestamped::new(self.pose, time_us);
        sink.on_refined_pose(&stamped);
        sink.on_map_to_sensor(&stamped);
        self.trajectory.push(stamped);
        sink.on_trajectory(&self.trajectory);

        if let Some(writer) = self.trajectory_writer.as_mut() {
            if let Err(e) = writer.write_pose(&self.pose) {
                error!("trajectory write failed: {}", e);
            }
        }
    }

    /// Run the resolution controller and rebind the retuned parameters.
    fn adapt(&mut self, whole_ms: f64, edge_stack_len: usize, plane_stack_len: usize) {
        let Some(update) = self
            .controller
            .update(whole_ms, edge_stack_len, plane_stack_len)
        else {
            return;
        };
        self.edge_filter.set_leaf_size(update.line_res);
        self.plane_filter.set_leaf_size(update.plane_res);
        let mut params = self.detector.params().clone();
        params.tolerance = update.cluster_tolerance;
        params.lambda = update.cluster_lambda;
        self.detector.set_params(params);
    }
}
