use nalgebra::{Matrix3, Rotation3, Unit, Vector3};

pub mod xenocollide;

const ZERO_THRESHOLD: f64 = 9.094947e-13;
const RENORMALIZATION_ITERATIONS: usize = 3;

/// Returns `true` if every component of `v` is below the collision-kernel zero threshold.
#[inline]
pub fn is_vector_zero(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.abs() < ZERO_THRESHOLD)
}

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_radians: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_radians).into_inner()
}

/// Pulls a slightly non-orthogonal matrix back onto the rotation manifold.
///
/// Uses the Newton-Schulz iteration `R <- 1.5 R - 0.5 R Rᵀ R`, which converges quadratically for
/// matrices already close to orthogonal, as is the case for orientations accumulated from many small
/// rotations.
pub fn renormalize_orientation(orientation: &Matrix3<f64>) -> Matrix3<f64> {
    let mut result = *orientation;
    for _ in 0..RENORMALIZATION_ITERATIONS {
        result = 1.5 * result - 0.5 * result * result.transpose() * result;
    }
    result
}

/// Largest absolute entry of `R Rᵀ - I`.
pub fn orthogonality_error(orientation: &Matrix3<f64>) -> f64 {
    (orientation * orientation.transpose() - Matrix3::identity())
        .iter()
        .fold(0.0f64, |acc, v| acc.max(v.abs()))
}
