//! Robust kernel functions for M-estimator weighting in the map solve.
//!
//! Feature-to-map correspondences inevitably contain outliers: returns from
//! moving objects, mixed pixels, and wrong nearest-neighbor matches. The
//! kernels below down-weight large residuals during the iteratively
//! reweighted Gauss-Newton solve.
//!
//! The pose refinement defaults to [`RobustKernel::Huber`] at a 0.1 m
//! scale, which keeps inliers at full weight while bounding the influence
//! of any single bad correspondence.

/// Robust kernel type for M-estimator weighting.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RobustKernel {
    /// No robust weighting (standard least squares).
    None,

    /// Huber kernel: quadratic for small errors, linear for large.
    ///
    /// Weight: `1` for `|r| < c`, `c/|r|` otherwise.
    #[default]
    Huber,

    /// Cauchy (Lorentzian) kernel: heavy-tailed, stronger rejection.
    ///
    /// Weight: `1 / (1 + (r/c)²)`
    Cauchy,
}

impl RobustKernel {
    /// Compute the IRLS weight for a given squared residual.
    ///
    /// # Arguments
    /// * `residual_sq` - Squared residual (distance²)
    /// * `scale` - Kernel scale parameter, same units as the residual
    #[inline(always)]
    pub fn weight(&self, residual_sq: f64, scale: f64) -> f64 {
        match self {
            RobustKernel::None => 1.0,
            RobustKernel::Huber => {
                let r = residual_sq.sqrt();
                if r < scale { 1.0 } else { scale / r }
            }
            RobustKernel::Cauchy => 1.0 / (1.0 + residual_sq / (scale * scale)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_kernel_always_one() {
        let kernel = RobustKernel::None;
        assert_eq!(kernel.weight(0.0, 0.1), 1.0);
        assert_eq!(kernel.weight(100.0, 0.1), 1.0);
    }

    #[test]
    fn test_huber_kernel() {
        let kernel = RobustKernel::Huber;
        let scale = 0.1;

        // Within threshold: full weight
        assert_eq!(kernel.weight(0.0, scale), 1.0);
        assert_eq!(kernel.weight(0.005 * 0.005, scale), 1.0);

        // 20cm residual at 10cm scale: weight = 0.5
        let w = kernel.weight(0.04, scale);
        assert!((w - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_cauchy_kernel() {
        let kernel = RobustKernel::Cauchy;
        let scale = 0.1;

        assert_eq!(kernel.weight(0.0, scale), 1.0);
        // Residual equal to scale: weight = 0.5
        assert!((kernel.weight(0.01, scale) - 0.5).abs() < 1e-9);
        assert!(kernel.weight(1.0, scale) < 0.01);
    }

    #[test]
    fn test_default_is_huber() {
        assert_eq!(RobustKernel::default(), RobustKernel::Huber);
    }

    #[test]
    fn test_weights_decrease_with_residual() {
        for kernel in [RobustKernel::Huber, RobustKernel::Cauchy] {
            let scale = 0.1;
            let w1 = kernel.weight(0.001, scale);
            let w2 = kernel.weight(0.01, scale);
            let w3 = kernel.weight(0.1, scale);
            assert!(w1 >= w2 && w2 >= w3, "{:?} not monotone", kernel);
        }
    }
}
