//! Iteratively reweighted Gauss-Newton solve on SO(3) × R³.
//!
//! The pose increment is a 6-vector `[δθ, δt]`: a rotation-tangent
//! perturbation applied on the right of the current quaternion and an
//! additive translation. Re-normalization happens implicitly through
//! `UnitQuaternion::from_scaled_axis`, so the quaternion never drifts off
//! the unit sphere.

use nalgebra::{Matrix6, UnitQuaternion, Vector3, Vector6};

use crate::core::math::hat;
use crate::core::types::Pose3D;

use super::correspondence::{EdgeCorrespondence, PlaneCorrespondence};
use super::robust_kernels::RobustKernel;

/// Increment norms below which the iteration is declared converged.
const TRANSLATION_EPSILON: f64 = 1e-10;
const ROTATION_EPSILON: f64 = 1e-10;

/// Summary of one linearized solve.
#[derive(Debug, Clone, Copy)]
pub struct SolveReport {
    /// Iterations actually run
    pub iterations: u32,
    /// True when the increment dropped below the convergence epsilons
    pub converged: bool,
}

/// Refine `pose` against the given correspondences.
///
/// Runs at most `max_iterations` Gauss-Newton steps. Residuals are scalar
/// point-to-line and signed point-to-plane distances; `kernel` supplies the
/// IRLS weight at the given `scale`. A singular normal system terminates
/// the iteration with the pose as-is — the caller accepts the best iterate.
pub fn solve_pose(
    pose: &mut Pose3D,
    edges: &[EdgeCorrespondence],
    planes: &[PlaneCorrespondence],
    kernel: RobustKernel,
    scale: f64,
    max_iterations: u32,
) -> SolveReport {
    let mut report = SolveReport {
        iterations: 0,
        converged: false,
    };

    for _ in 0..max_iterations {
        report.iterations += 1;

        let mut h = Matrix6::<f64>::zeros();
        let mut g = Vector6::<f64>::zeros();
        let rotation_matrix = *pose.rotation.to_rotation_matrix().matrix();

        for corr in edges {
            let world = pose.transform_point(&corr.point);
            let axis = corr.line_a - corr.line_b;
            let axis_norm = axis.norm();
            if axis_norm < 1e-12 {
                continue;
            }
            let direction = axis / axis_norm;
            let from_anchor = world - corr.line_a;
            let perpendicular = from_anchor - direction * direction.dot(&from_anchor);
            let residual = perpendicular.norm();
            if residual < 1e-12 {
                continue;
            }
            let gradient = perpendicular / residual;
            accumulate(
                &mut h,
                &mut g,
                &rotation_matrix,
                &corr.point,
                &gradient,
                residual,
                kernel.weight(residual * residual, scale),
            );
        }

        for corr in planes {
            let world = pose.transform_point(&corr.point);
            let residual = corr.normal.dot(&world) + corr.offset;
            accumulate(
                &mut h,
                &mut g,
                &rotation_matrix,
                &corr.point,
                &corr.normal,
                residual,
                kernel.weight(residual * residual, scale),
            );
        }

        let Some(cholesky) = h.cholesky() else {
            // Rank-deficient system (too few constraints): keep the pose.
            break;
        };
        let delta = cholesky.solve(&g);

        let delta_rotation: Vector3<f64> = delta.fixed_rows::<3>(0).into_owned();
        let delta_translation: Vector3<f64> = delta.fixed_rows::<3>(3).into_owned();

        pose.rotation *= UnitQuaternion::from_scaled_axis(delta_rotation);
        pose.translation += delta_translation;

        if delta_translation.norm() < TRANSLATION_EPSILON
            && delta_rotation.norm() < ROTATION_EPSILON
        {
            report.converged = true;
            break;
        }
    }

    report
}

/// Add one scalar residual row to the normal equations.
///
/// The residual gradient w.r.t. the world point is `gradient`; chained with
/// the right-perturbation derivative `∂p_w/∂δθ = -R·[p]ₓ` and
/// `∂p_w/∂δt = I`.
#[inline]
fn accumulate(
    h: &mut Matrix6<f64>,
    g: &mut Vector6<f64>,
    rotation_matrix: &nalgebra::Matrix3<f64>,
    local_point: &Vector3<f64>,
    gradient: &Vector3<f64>,
    residual: f64,
    weight: f64,
) {
    let rotation_jacobian = -(rotation_matrix * hat(local_point)).transpose() * gradient;

    let mut jacobian = Vector6::zeros();
    jacobian.fixed_rows_mut::<3>(0).copy_from(&rotation_jacobian);
    jacobian.fixed_rows_mut::<3>(3).copy_from(gradient);

    *h += weight * jacobian * jacobian.transpose();
    *g -= weight * jacobian * residual;
}
