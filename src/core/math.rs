//! Small shared math helpers for the 6-DoF solver.

use nalgebra::{Matrix3, Vector3};

/// Skew-symmetric (hat) matrix of a 3-vector.
///
/// `hat(v) * w == v.cross(&w)` for any `w`.
#[inline]
pub fn hat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Symmetric eigendecomposition with eigenvalues sorted ascending.
///
/// Returns `(eigenvalues, eigenvectors)` where column `i` of the matrix is
/// the eigenvector of eigenvalue `i`. nalgebra does not guarantee an
/// ordering, so the line-likeness test sorts here once.
pub fn sorted_symmetric_eigen(matrix: Matrix3<f64>) -> (Vector3<f64>, Matrix3<f64>) {
    let eigen = nalgebra::SymmetricEigen::new(matrix);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[a]
            .partial_cmp(&eigen.eigenvalues[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let values = Vector3::new(
        eigen.eigenvalues[order[0]],
        eigen.eigenvalues[order[1]],
        eigen.eigenvalues[order[2]],
    );
    let vectors = Matrix3::from_columns(&[
        eigen.eigenvectors.column(order[0]).into_owned(),
        eigen.eigenvectors.column(order[1]).into_owned(),
        eigen.eigenvectors.column(order[2]).into_owned(),
    ]);
    (values, vectors)
}
