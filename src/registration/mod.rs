//! # Registration Coordinator
//!
//! Resolves one block's global transform against an already-resolved
//! neighbour:
//!
//! ```text
//! T(target) = T(reference) · relative      (relative: target-local → reference-local)
//! ```
//!
//! The numerical alignment itself is external and reached through the
//! [`Aligner`] trait. Failures are surfaced with their metrics; there is
//! no retry loop. Callers retry with another threshold or seed through
//! [`RegistrationOptions`].

pub(crate) mod camera_centers;

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{AcceptanceCriteria, RegistrationConfig};
use crate::model::*;
use crate::registry::BlockRegistry;
use crate::storage::BlockStore;
use crate::{Error, Result};

pub use camera_centers::{camera_centers_from_json, load_camera_centers};

// ============================================================================
// Solver contract
// ============================================================================

/// Quality of one alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentMetrics {
    /// RMS distance over inlier correspondences.
    pub inlier_rmse: f64,
    /// Fraction of target points with a correspondence inside the threshold.
    pub fitness: f64,
}

/// Raw solver output. The matrix is validated as rigid before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// Maps target-local points into the reference block's local frame.
    pub transform: DMat4,
    pub metrics: AlignmentMetrics,
}

/// External point-set registration solver (e.g. point-to-point ICP).
///
/// Implementations return `Error::Convergence` when they fail to
/// converge.
pub trait Aligner: Send + Sync {
    fn align(
        &self,
        target: &[DVec3],
        reference: &[DVec3],
        initial_guess: &RigidTransform,
        distance_threshold: f64,
    ) -> Result<Alignment>;
}

impl<A: Aligner + ?Sized> Aligner for &A {
    fn align(
        &self,
        target: &[DVec3],
        reference: &[DVec3],
        initial_guess: &RigidTransform,
        distance_threshold: f64,
    ) -> Result<Alignment> {
        (**self).align(target, reference, initial_guess, distance_threshold)
    }
}

// ============================================================================
// Requests and results
// ============================================================================

/// A block and its local point set.
#[derive(Debug, Clone, Copy)]
pub struct BlockPoints<'a> {
    pub id: &'a BlockId,
    pub points: &'a [DVec3],
}

impl<'a> BlockPoints<'a> {
    pub fn new(id: &'a BlockId, points: &'a [DVec3]) -> Self {
        Self { id, points }
    }
}

/// Per-call overrides of the configured registration settings.
#[derive(Debug, Clone, Default)]
pub struct RegistrationOptions {
    pub initial_guess: Option<RigidTransform>,
    pub distance_threshold: Option<f64>,
    pub acceptance: Option<AcceptanceCriteria>,
}

/// One accepted alignment between two blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationEdge {
    pub reference: BlockId,
    pub target: BlockId,
    /// Target-local → reference-local.
    pub relative: RigidTransform,
    pub metrics: AlignmentMetrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationOutcome {
    pub edge: RegistrationEdge,
    /// The committed target block.
    pub block: Block,
    /// Set when the reference was promoted to anchor by this call.
    pub anchored: Option<Block>,
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct RegistrationCoordinator<S: BlockStore, A: Aligner> {
    registry: BlockRegistry<S>,
    aligner: A,
    config: RegistrationConfig,
}

impl<S: BlockStore, A: Aligner> RegistrationCoordinator<S, A> {
    pub fn new(registry: BlockRegistry<S>, aligner: A, config: RegistrationConfig) -> Self {
        Self { registry, aligner, config }
    }

    pub fn registry(&self) -> &BlockRegistry<S> {
        &self.registry
    }

    pub fn into_registry(self) -> BlockRegistry<S> {
        self.registry
    }

    pub fn aligner(&self) -> &A {
        &self.aligner
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register `target` against `reference` with the configured settings.
    pub async fn register(
        &self,
        reference: BlockPoints<'_>,
        target: BlockPoints<'_>,
    ) -> Result<RegistrationOutcome> {
        self.register_with(reference, target, &RegistrationOptions::default()).await
    }

    /// Register with per-call overrides (retry with another seed/threshold).
    pub async fn register_with(
        &self,
        reference: BlockPoints<'_>,
        target: BlockPoints<'_>,
        options: &RegistrationOptions,
    ) -> Result<RegistrationOutcome> {
        if reference.id == target.id {
            return Err(Error::MalformedInput(format!(
                "block '{}' cannot be registered against itself",
                target.id
            )));
        }
        self.check_points(&reference)?;
        self.check_points(&target)?;
        if self.registry.contains(target.id) {
            return Err(Error::AlreadyRegistered(target.id.to_string()));
        }

        let threshold = options.distance_threshold.unwrap_or(self.config.distance_threshold);
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(Error::MalformedInput(format!(
                "distance threshold must be positive, got {threshold}"
            )));
        }
        let guess = options
            .initial_guess
            .or(self.config.initial_guess)
            .unwrap_or(RigidTransform::IDENTITY);
        let acceptance = options.acceptance.unwrap_or(self.config.acceptance);

        let anchored = self.ensure_reference(&reference).await?;
        let reference_global = self.registry.get_transform(reference.id)?;

        let alignment = self
            .aligner
            .align(target.points, reference.points, &guess, threshold)
            .inspect_err(|e| {
                warn!(reference = %reference.id, target = %target.id, threshold, error = %e,
                    "alignment failed");
            })?;
        let metrics = alignment.metrics;
        info!(
            reference = %reference.id,
            target = %target.id,
            inlier_rmse = metrics.inlier_rmse,
            fitness = metrics.fitness,
            "alignment finished"
        );

        let relative = RigidTransform::try_from_matrix(alignment.transform).map_err(|e| {
            warn!(target = %target.id, error = %e, "solver returned a non-rigid transform");
            Error::Convergence {
                reason: format!("solver returned a non-rigid transform: {e}"),
                metrics: Some(metrics),
            }
        })?;
        if let Err(e) = acceptance.check(&metrics) {
            warn!(target = %target.id, error = %e, "alignment rejected; nothing persisted");
            return Err(e);
        }

        let global = reference_global.compose(&relative);
        let aabb = compute_aabb(target.points, &global)?;
        let block = self.registry.put_transform(target.id, global, Some(aabb)).await?;

        Ok(RegistrationOutcome {
            edge: RegistrationEdge {
                reference: reference.id.clone(),
                target: target.id.clone(),
                relative,
                metrics,
            },
            block,
            anchored,
        })
    }

    /// Register an ordered list of `(reference, target)` pairs, stopping at
    /// the first failure. Outcomes of earlier pairs stay committed.
    pub async fn register_chain(
        &self,
        steps: &[(BlockPoints<'_>, BlockPoints<'_>)],
    ) -> Result<Vec<RegistrationOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (reference, target) in steps {
            outcomes.push(self.register(*reference, *target).await?);
        }
        Ok(outcomes)
    }

    /// A reference into an empty registry becomes the anchor; any other
    /// reference outside the registry is an error.
    async fn ensure_reference(&self, reference: &BlockPoints<'_>) -> Result<Option<Block>> {
        if self.registry.contains(reference.id) {
            return Ok(None);
        }
        if !self.registry.is_empty() {
            let anchor = self.registry.anchor().map(|a| a.id.to_string());
            return Err(Error::NotFound(format!(
                "reference block '{}' is not registered (anchor: {})",
                reference.id,
                anchor.as_deref().unwrap_or("none")
            )));
        }
        let aabb = compute_aabb(reference.points, &RigidTransform::IDENTITY)?;
        let block = self.registry.register_anchor(reference.id, Some(aabb)).await?;
        info!(block = %block.id, "reference promoted to anchor");
        Ok(Some(block))
    }

    fn check_points(&self, block: &BlockPoints<'_>) -> Result<()> {
        if block.points.len() < self.config.min_points {
            return Err(Error::MalformedInput(format!(
                "block '{}' has {} points, need at least {}",
                block.id,
                block.points.len(),
                self.config.min_points
            )));
        }
        if block.points.iter().any(|p| !p.is_finite()) {
            return Err(Error::MalformedInput(format!(
                "block '{}' has non-finite points",
                block.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    struct Translate(DVec3);

    impl Aligner for Translate {
        fn align(&self, _: &[DVec3], _: &[DVec3], _: &RigidTransform, _: f64) -> Result<Alignment> {
            Ok(Alignment {
                transform: DMat4::from_translation(self.0),
                metrics: AlignmentMetrics { inlier_rmse: 0.0, fitness: 1.0 },
            })
        }
    }

    fn cloud() -> Vec<DVec3> {
        vec![DVec3::ZERO, DVec3::X, DVec3::Z, DVec3::new(1.0, 1.0, 1.0)]
    }

    async fn coordinator(shift: DVec3) -> RegistrationCoordinator<MemoryStore, Translate> {
        let registry = BlockRegistry::open(MemoryStore::new()).await.unwrap();
        RegistrationCoordinator::new(registry, Translate(shift), RegistrationConfig::default())
    }

    #[tokio::test]
    async fn test_self_registration_rejected() {
        let c = coordinator(DVec3::X).await;
        let a = BlockId::from("A");
        let pts = cloud();
        let err = c.register(BlockPoints::new(&a, &pts), BlockPoints::new(&a, &pts)).await;
        assert!(matches!(err, Err(Error::MalformedInput(_))));
        assert!(c.registry().is_empty());
    }

    #[tokio::test]
    async fn test_too_few_points_rejected_before_anchoring() {
        let c = coordinator(DVec3::X).await;
        let (a, b) = (BlockId::from("A"), BlockId::from("B"));
        let few = vec![DVec3::ZERO];
        let pts = cloud();
        let err = c.register(BlockPoints::new(&a, &pts), BlockPoints::new(&b, &few)).await;
        assert!(matches!(err, Err(Error::MalformedInput(_))));
        assert!(c.registry().is_empty());
    }

    #[tokio::test]
    async fn test_disconnected_reference_rejected() {
        let c = coordinator(DVec3::X).await;
        let (a, b, x, y): (BlockId, BlockId, BlockId, BlockId) =
            ("A".into(), "B".into(), "X".into(), "Y".into());
        let pts = cloud();
        c.register(BlockPoints::new(&a, &pts), BlockPoints::new(&b, &pts)).await.unwrap();
        let err = c.register(BlockPoints::new(&x, &pts), BlockPoints::new(&y, &pts)).await;
        assert!(matches!(err, Err(Error::NotFound(_))));
        assert!(!c.registry().contains(&x));
    }

    #[tokio::test]
    async fn test_aabb_is_in_global_frame() {
        let c = coordinator(DVec3::new(5.0, 0.0, 0.0)).await;
        let (a, b): (BlockId, BlockId) = ("A".into(), "B".into());
        let pts = cloud();
        let out = c.register(BlockPoints::new(&a, &pts), BlockPoints::new(&b, &pts)).await.unwrap();
        let aabb = out.block.aabb.unwrap();
        assert_eq!(aabb.min, DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(aabb.max, DVec3::new(6.0, 1.0, 1.0));
        assert!(out.anchored.is_some());
    }
}
