//! Rigid 4×4 homogeneous transforms.
//!
//! Matrices are stored column-major (glam) but every external surface
//! (store rows, JSON, solver output) speaks row-major `t{row}{col}`.

use glam::{DMat3, DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Maximum deviation of `RᵀR` from identity (and of `det R` from 1)
/// accepted for a rotation block.
pub const ORTHONORMAL_TOLERANCE: f64 = 1e-6;

/// A rotation + translation, no scale or shear.
///
/// Construction through [`RigidTransform::try_from_rows`] or
/// [`RigidTransform::try_from_matrix`] validates the matrix; the
/// associated constructors (`identity`, `from_translation`, ...) are
/// rigid by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 4]; 4]", into = "[[f64; 4]; 4]")]
pub struct RigidTransform(DMat4);

impl RigidTransform {
    pub const IDENTITY: Self = Self(DMat4::IDENTITY);

    pub fn identity() -> Self {
        Self::IDENTITY
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self(DMat4::from_translation(translation))
    }

    /// Rotation about +Y (yaw) followed by translation.
    pub fn from_yaw_translation(yaw: f64, translation: DVec3) -> Self {
        let rotation = DMat3::from_rotation_y(yaw);
        Self::from_parts_unchecked(rotation, translation)
    }

    /// Build from a rotation block and translation, validating the rotation.
    pub fn from_rotation_translation(rotation: DMat3, translation: DVec3) -> Result<Self> {
        Self::try_from_matrix(compose_matrix(rotation, translation))
    }

    fn from_parts_unchecked(rotation: DMat3, translation: DVec3) -> Self {
        Self(compose_matrix(rotation, translation))
    }

    /// Validate an arbitrary homogeneous matrix as a rigid transform.
    pub fn try_from_matrix(m: DMat4) -> Result<Self> {
        if !m.is_finite() {
            return Err(Error::MalformedInput(
                "transform contains non-finite entries".into(),
            ));
        }
        let bottom = m.row(3);
        if (bottom - DVec4::new(0.0, 0.0, 0.0, 1.0)).abs().max_element() > ORTHONORMAL_TOLERANCE {
            return Err(Error::MalformedInput(format!(
                "transform bottom row must be [0, 0, 0, 1], got {:?}",
                bottom.to_array()
            )));
        }
        let r = DMat3::from_mat4(m);
        let gram = r.transpose() * r;
        let deviation = (gram - DMat3::IDENTITY)
            .to_cols_array()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if deviation > ORTHONORMAL_TOLERANCE {
            return Err(Error::MalformedInput(format!(
                "rotation block is not orthonormal (max |RᵀR - I| = {deviation:.3e})"
            )));
        }
        let det = r.determinant();
        if (det - 1.0).abs() > ORTHONORMAL_TOLERANCE {
            return Err(Error::MalformedInput(format!(
                "rotation block must be proper (det = {det:.6})"
            )));
        }
        Ok(Self(m))
    }

    /// Parse a row-major 4×4 array (`rows[i][j]` = `t{i}{j}`).
    pub fn try_from_rows(rows: [[f64; 4]; 4]) -> Result<Self> {
        Self::try_from_matrix(DMat4::from_cols_array_2d(&rows).transpose())
    }

    /// Parse 16 row-major values, as stored in `block_transforms.t00..t33`.
    pub fn try_from_row_major(values: &[f64]) -> Result<Self> {
        let flat: [f64; 16] = values.try_into().map_err(|_| {
            Error::MalformedInput(format!("expected 16 transform values, got {}", values.len()))
        })?;
        Self::try_from_matrix(DMat4::from_cols_array(&flat).transpose())
    }

    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        self.0.transpose().to_cols_array_2d()
    }

    pub fn to_row_major(&self) -> [f64; 16] {
        self.0.transpose().to_cols_array()
    }

    pub fn matrix(&self) -> DMat4 {
        self.0
    }

    pub fn rotation(&self) -> DMat3 {
        DMat3::from_mat4(self.0)
    }

    pub fn translation(&self) -> DVec3 {
        self.0.w_axis.truncate()
    }

    /// `self · other`: apply `other` first, then `self`.
    pub fn compose(&self, other: &RigidTransform) -> RigidTransform {
        Self(self.0 * other.0)
    }

    /// Closed-form rigid inverse: `[Rᵀ | -Rᵀt]`.
    pub fn inverse(&self) -> RigidTransform {
        let rt = self.rotation().transpose();
        Self::from_parts_unchecked(rt, -(rt * self.translation()))
    }

    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.0.transform_point3(p)
    }

    pub fn is_identity(&self) -> bool {
        self.0 == DMat4::IDENTITY
    }

    pub fn abs_diff_eq(&self, other: &RigidTransform, tolerance: f64) -> bool {
        self.0.abs_diff_eq(other.0, tolerance)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl TryFrom<[[f64; 4]; 4]> for RigidTransform {
    type Error = Error;

    fn try_from(rows: [[f64; 4]; 4]) -> Result<Self> {
        Self::try_from_rows(rows)
    }
}

impl From<RigidTransform> for [[f64; 4]; 4] {
    fn from(t: RigidTransform) -> Self {
        t.to_rows()
    }
}

pub(crate) fn compose_matrix(rotation: DMat3, translation: DVec3) -> DMat4 {
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}
