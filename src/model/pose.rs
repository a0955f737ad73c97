//! Camera pose as read from and handed back to the renderer.

use glam::{DMat3, DMat4, DVec3};
use serde::{Deserialize, Serialize};

use super::transform::compose_matrix;
use super::RigidTransform;

/// Camera orientation + position in the active block's local frame.
///
/// The renderer owns the camera; the navigation core only reads a pose
/// and proposes a new one. The rotation is taken as-is (no validation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub rotation: DMat3,
    pub translation: DVec3,
}

impl Pose {
    pub fn new(rotation: DMat3, translation: DVec3) -> Self {
        Self { rotation, translation }
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self::new(DMat3::IDENTITY, translation)
    }

    /// Split a camera-to-world matrix (3×4 or 4×4 layout) into a pose.
    pub fn from_matrix(m: DMat4) -> Self {
        Self::new(DMat3::from_mat4(m), m.w_axis.truncate())
    }

    pub fn to_matrix(&self) -> DMat4 {
        compose_matrix(self.rotation, self.translation)
    }

    pub fn position(&self) -> DVec3 {
        self.translation
    }

    /// Left-multiply by a rigid transform: `T · P`.
    pub fn transformed_by(&self, t: &RigidTransform) -> Pose {
        Pose::from_matrix(t.matrix() * self.to_matrix())
    }

    pub fn abs_diff_eq(&self, other: &Pose, tolerance: f64) -> bool {
        self.rotation.abs_diff_eq(other.rotation, tolerance)
            && self.translation.abs_diff_eq(other.translation, tolerance)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::from_translation(DVec3::ZERO)
    }
}
