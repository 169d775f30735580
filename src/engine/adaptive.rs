//! Adaptive voxel-resolution control.
//!
//! A bounded feedback loop: when a frame overruns the time budget the leaf
//! sizes coarsen, when it underruns they refine, and a hard floor keeps
//! the filters from collapsing. The cluster tolerance and human-heuristic
//! weight are re-derived from the leaf sizes every update.

use log::debug;

/// Hard floor for both leaf sizes in meters.
pub const MIN_RESOLUTION: f32 = 0.02;

/// Hysteresis band around the target time: only frames outside
/// `[0.9 · target, 1.1 · target]` adjust the resolutions.
const OVERRUN_FACTOR: f64 = 1.1;
const UNDERRUN_FACTOR: f64 = 0.9;

/// Mixing weight split between the two feature classes.
const RATE_GAIN: f32 = 0.1;

/// New parameter values produced by one controller update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionUpdate {
    /// Edge-feature voxel leaf in meters
    pub line_res: f32,
    /// Planar-feature voxel leaf in meters
    pub plane_res: f32,
    /// Derived Euclidean-clustering radius
    pub cluster_tolerance: f32,
    /// Derived human-heuristic weight
    pub cluster_lambda: f32,
}

/// Per-frame resolution controller.
#[derive(Debug, Clone)]
pub struct ResolutionController {
    enabled: bool,
    target_ms: f64,
    line_res: f32,
    plane_res: f32,
}

impl ResolutionController {
    /// Create a controller starting from the configured leaf sizes.
    pub fn new(enabled: bool, target_ms: f32, line_res: f32, plane_res: f32) -> Self {
        Self {
            enabled,
            target_ms: f64::from(target_ms),
            line_res,
            plane_res,
        }
    }

    /// Current edge leaf size.
    pub fn line_res(&self) -> f32 {
        self.line_res
    }

    /// Current plane leaf size.
    pub fn plane_res(&self) -> f32 {
        self.plane_res
    }

    /// Feed one frame's wall time and stack sizes.
    ///
    /// Returns the retuned parameters, or `None` when the controller is
    /// disabled (the initial resolutions then stay bound forever).
    pub fn update(
        &mut self,
        whole_ms: f64,
        corner_points: usize,
        surf_points: usize,
    ) -> Option<ResolutionUpdate> {
        if !self.enabled {
            return None;
        }

        let total = corner_points + surf_points;
        if total > 0 {
            let rate_corner = RATE_GAIN * corner_points as f32 / total as f32;
            let rate_surf = RATE_GAIN - rate_corner;

            if whole_ms > self.target_ms * OVERRUN_FACTOR {
                self.line_res *= 1.0 + rate_corner;
                self.plane_res *= 1.0 + rate_surf;
            } else if whole_ms < self.target_ms * UNDERRUN_FACTOR {
                self.line_res = (self.line_res * (1.0 - rate_corner)).max(MIN_RESOLUTION);
                self.plane_res = (self.plane_res * (1.0 - rate_surf)).max(MIN_RESOLUTION);
            }
        }

        debug!(
            "resolution: line {:.4} plane {:.4} ({}ms against {}ms target)",
            self.line_res, self.plane_res, whole_ms, self.target_ms
        );

        let leaf_sum = self.line_res + self.plane_res;
        Some(ResolutionUpdate {
            line_res: self.line_res,
            plane_res: self.plane_res,
            cluster_tolerance: 2.0 * leaf_sum,
            cluster_lambda: 4.0 * leaf_sum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_disabled_controller_returns_none() {
        let mut controller = ResolutionController::new(false, 1.0, 0.1, 0.1);
        assert!(controller.update(100.0, 100, 100).is_none());
        assert_relative_eq!(controller.line_res(), 0.1);
    }

    #[test]
    fn test_overrun_coarsens_monotonically() {
        let mut controller = ResolutionController::new(true, 1.0, 0.1, 0.1);
        let mut previous = (controller.line_res(), controller.plane_res());
        for _ in 0..10 {
            controller.update(100.0, 300, 700).unwrap();
            assert!(controller.line_res() >= previous.0);
            assert!(controller.plane_res() >= previous.1);
            previous = (controller.line_res(), controller.plane_res());
        }
    }

    #[test]
    fn test_coarsening_compounds_exactly() {
        let mut controller = ResolutionController::new(true, 1.0, 0.1, 0.1);
        let rate_corner: f32 = 0.1 * 300.0 / 1000.0;
        let rate_surf: f32 = 0.1 - rate_corner;
        for _ in 0..10 {
            controller.update(100.0, 300, 700).unwrap();
        }
        assert_relative_eq!(
            controller.line_res(),
            0.1 * (1.0 + rate_corner).powi(10),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            controller.plane_res(),
            0.1 * (1.0 + rate_surf).powi(10),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_underrun_refines_to_floor() {
        let mut controller = ResolutionController::new(true, 1000.0, 0.1, 0.1);
        let mut previous = (controller.line_res(), controller.plane_res());
        for _ in 0..200 {
            controller.update(1.0, 500, 500).unwrap();
            assert!(controller.line_res() <= previous.0);
            assert!(controller.plane_res() <= previous.1);
            previous = (controller.line_res(), controller.plane_res());
        }
        assert_relative_eq!(controller.line_res(), MIN_RESOLUTION);
        assert_relative_eq!(controller.plane_res(), MIN_RESOLUTION);
    }

    #[test]
    fn test_within_band_unchanged() {
        let mut controller = ResolutionController::new(true, 100.0, 0.1, 0.1);
        controller.update(100.0, 500, 500).unwrap();
        assert_relative_eq!(controller.line_res(), 0.1);
        assert_relative_eq!(controller.plane_res(), 0.1);
    }

    #[test]
    fn test_derived_cluster_parameters() {
        let mut controller = ResolutionController::new(true, 100.0, 0.1, 0.1);
        let update = controller.update(100.0, 500, 500).unwrap();
        assert_relative_eq!(update.cluster_tolerance, 2.0 * 0.2, epsilon = 1e-6);
        assert_relative_eq!(update.cluster_lambda, 4.0 * 0.2, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_stacks_leave_resolutions() {
        let mut controller = ResolutionController::new(true, 1.0, 0.1, 0.1);
        let update = controller.update(100.0, 0, 0).unwrap();
        assert_relative_eq!(update.line_res, 0.1);
    }
}
