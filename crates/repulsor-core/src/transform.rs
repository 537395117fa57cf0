// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Local/world frame conversions.

use glam::{DAffine3, DMat3, DMat4, DVec3};
use thiserror::Error;

/// Element-wise tolerance under which two transforms count as equal.
pub const TRANSFORM_EPSILON: f64 = 1e-6;

/// Determinant magnitude at or below which a transform is treated as singular.
pub const SINGULAR_DETERMINANT: f64 = 1e-12;

/// A transform that cannot map world displacements back into local space.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TransformError {
    /// The linear part collapses space.
    #[error("singular transform (determinant {determinant:e})")]
    Singular {
        /// Determinant of the linear part.
        determinant: f64,
    },
    /// The transform or its inverse contains NaN or infinity.
    #[error("non-finite transform")]
    NonFinite,
}

/// Maps local positions through `transform`.
pub fn to_world(transform: &DMat4, local: &[DVec3]) -> Vec<DVec3> {
    local.iter().map(|&p| transform.transform_point3(p)).collect()
}

/// Maps world-space displacement vectors (w = 0) into the local frame using the
/// full affine inverse of `transform`.
pub fn world_delta_to_local(
    transform: &DMat4,
    world: &[DVec3],
) -> Result<Vec<DVec3>, TransformError> {
    if !transform.is_finite() {
        return Err(TransformError::NonFinite);
    }
    let determinant = DMat3::from_mat4(*transform).determinant();
    if determinant.abs() <= SINGULAR_DETERMINANT {
        return Err(TransformError::Singular { determinant });
    }
    let inverse = DAffine3::from_mat4(*transform).inverse();
    if !inverse.is_finite() {
        return Err(TransformError::NonFinite);
    }
    Ok(world
        .iter()
        .map(|&d| inverse.transform_vector3(d))
        .collect())
}

/// True when every element of `a` and `b` differs by at most `eps`.
pub fn matrices_close(a: &DMat4, b: &DMat4, eps: f64) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() <= eps)
}
