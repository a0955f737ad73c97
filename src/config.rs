//! Configuration surface consumed by the core.
//!
//! All sections deserialize with defaults, so a partial JSON file (or
//! `{}`) is a valid configuration.
//!
//! ```json
//! {
//!   "registration": { "distance_threshold": 0.5,
//!                     "acceptance": { "min_fitness": 0.6 } },
//!   "portals": { "directionality": "bidirectional", "height": { "fixed_y": 1.6 } },
//!   "navigation": { "remap": "full_pose", "dwell_polls": 30 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::RigidTransform;
use crate::registration::AlignmentMetrics;
use crate::{Error, Result};

// ============================================================================
// Top level
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StitchConfig {
    pub registration: RegistrationConfig,
    pub portals: PortalConfig,
    pub navigation: NavigationConfig,
}

impl StitchConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.registration.validate()?;
        self.portals.validate()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Offline registration settings.
///
/// The anchor rule is fixed: the first reference block seen with no
/// stored transform becomes the anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Max correspondence distance handed to the solver.
    pub distance_threshold: f64,
    /// Seed for the solver, e.g. from a manual pre-alignment. Identity when absent.
    pub initial_guess: Option<RigidTransform>,
    pub acceptance: AcceptanceCriteria,
    /// Minimum points per block before the solver is invoked.
    pub min_points: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.5,
            initial_guess: None,
            acceptance: AcceptanceCriteria::default(),
            min_points: 3,
        }
    }
}

impl RegistrationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(Error::MalformedInput(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            )));
        }
        if self.min_points == 0 {
            return Err(Error::MalformedInput("min_points must be at least 1".into()));
        }
        Ok(())
    }
}

/// Caller's quality bar for a solver result. Unset bounds accept anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceCriteria {
    pub min_fitness: Option<f64>,
    pub max_inlier_rmse: Option<f64>,
}

impl AcceptanceCriteria {
    pub fn check(&self, metrics: &AlignmentMetrics) -> Result<()> {
        if let Some(min) = self.min_fitness {
            if !(metrics.fitness >= min) {
                return Err(Error::Convergence {
                    reason: format!("fitness {:.4} below acceptance bar {min:.4}", metrics.fitness),
                    metrics: Some(*metrics),
                });
            }
        }
        if let Some(max) = self.max_inlier_rmse {
            if !(metrics.inlier_rmse <= max) {
                return Err(Error::Convergence {
                    reason: format!(
                        "inlier RMSE {:.4} above acceptance bar {max:.4}",
                        metrics.inlier_rmse
                    ),
                    metrics: Some(*metrics),
                });
            }
        }
        Ok(())
    }
}

// ============================================================================
// Portals
// ============================================================================

/// Whether a portal can be walked back through.
///
/// Applied by the portal builder and stored with every record; the
/// runtime follows the stored value, not its own config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directionality {
    /// An edge on both blocks.
    #[default]
    Bidirectional,
    /// Only the forward edge on the source block.
    Unidirectional,
}

/// How height takes part in triggers and pose remapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightPolicy {
    /// Planar triggers; trigger points sit at y = 0; remapped height is
    /// whatever the composition yields.
    #[default]
    IgnoreY,
    /// Planar triggers at the given height; remapped height is pinned to it.
    FixedY(f64),
    /// Spherical triggers around the stored trigger height; height carried
    /// through the remap.
    CarryY,
}

impl HeightPolicy {
    /// Height assigned to a hand-written trigger point.
    pub fn trigger_height(&self) -> f64 {
        match self {
            HeightPolicy::FixedY(h) => *h,
            HeightPolicy::IgnoreY | HeightPolicy::CarryY => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub directionality: Directionality,
    pub height: HeightPolicy,
    pub default_radius: f64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            directionality: Directionality::Bidirectional,
            height: HeightPolicy::IgnoreY,
            default_radius: 0.5,
        }
    }
}

impl PortalConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.default_radius.is_finite() && self.default_radius > 0.0) {
            return Err(Error::MalformedInput(format!(
                "default_radius must be positive, got {}",
                self.default_radius
            )));
        }
        if let HeightPolicy::FixedY(h) = self.height {
            if !h.is_finite() {
                return Err(Error::MalformedInput("fixed_y height must be finite".into()));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Navigation
// ============================================================================

/// How the camera pose is carried into the destination block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapPolicy {
    /// `P' = T(dest)⁻¹ · T(src) · P`.
    #[default]
    FullPose,
    /// Snap x/z to the destination point, keep orientation and height.
    /// Only correct when both blocks share orientation.
    PositionOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub remap: RemapPolicy,
    /// Polls to wait after a switch before triggers are considered again.
    pub dwell_polls: u32,
    /// After a switch, require the camera to leave every trigger of the
    /// new block before re-arming.
    pub rearm_on_exit: bool,
    /// Render frames between polls when driven through `drive`.
    pub poll_interval: u32,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            remap: RemapPolicy::FullPose,
            dwell_polls: 30,
            rearm_on_exit: true,
            poll_interval: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_gives_defaults() {
        assert_eq!(StitchConfig::from_json_str("{}").unwrap(), StitchConfig::default());
    }

    #[test]
    fn test_policies_parse_from_snake_case() {
        let config = StitchConfig::from_json_str(
            r#"{
                "portals": { "directionality": "unidirectional", "height": { "fixed_y": 1.5 } },
                "navigation": { "remap": "position_only", "dwell_polls": 5 }
            }"#,
        )
        .unwrap();
        assert_eq!(config.portals.directionality, Directionality::Unidirectional);
        assert_eq!(config.portals.height, HeightPolicy::FixedY(1.5));
        assert_eq!(config.portals.default_radius, 0.5);
        assert_eq!(config.navigation.remap, RemapPolicy::PositionOnly);
        assert_eq!(config.navigation.dwell_polls, 5);
        assert!(config.navigation.rearm_on_exit);
    }

    #[test]
    fn test_initial_guess_is_validated() {
        let err = StitchConfig::from_json_str(
            r#"{ "registration": { "initial_guess":
                [[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,1,1]] } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let err = StitchConfig::from_json_str(r#"{ "registration": { "distance_threshold": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[test]
    fn test_acceptance_reports_metrics() {
        let bar = AcceptanceCriteria { min_fitness: Some(0.8), max_inlier_rmse: None };
        let metrics = AlignmentMetrics { inlier_rmse: 0.01, fitness: 0.4 };
        let err = bar.check(&metrics).unwrap_err();
        assert_eq!(err.metrics(), Some(&metrics));
        assert!(bar.check(&AlignmentMetrics { inlier_rmse: 0.01, fitness: 0.9 }).is_ok());
    }
}
