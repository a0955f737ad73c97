//! Portal records (what is stored) and portal edges (what is traversed).

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::BlockId;

/// A trigger request as written by hand: a point in `block_a`'s local
/// frame that should lead into `block_b`.
///
/// CSV layout (no header): `block_a, x_a, z_a, block_b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRequest {
    pub block_a: BlockId,
    pub x_a: f64,
    pub z_a: f64,
    pub block_b: BlockId,
}

/// One stored portal: both endpoints denote the same physical location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRecord {
    pub portal_id: String,
    pub block_a: BlockId,
    pub local_a: DVec3,
    pub block_b: BlockId,
    pub local_b: DVec3,
    pub radius: f64,
    /// Fixed when the portal is built; the adjacency adds the reverse
    /// edge only when set.
    pub bidirectional: bool,
}

/// Which way an edge runs relative to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeDirection {
    /// `block_a → block_b`
    Forward,
    /// `block_b → block_a`, present only for bidirectional graphs
    Reverse,
}

/// A directed trigger attached to its source block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalEdge {
    pub portal_id: String,
    pub source: BlockId,
    /// Trigger centre in the source block's local frame.
    pub trigger: DVec3,
    pub radius: f64,
    pub destination: BlockId,
    /// Matching point in the destination block's local frame.
    pub destination_point: DVec3,
    pub direction: EdgeDirection,
}

impl PortalEdge {
    pub fn forward(record: &PortalRecord) -> Self {
        Self {
            portal_id: record.portal_id.clone(),
            source: record.block_a.clone(),
            trigger: record.local_a,
            radius: record.radius,
            destination: record.block_b.clone(),
            destination_point: record.local_b,
            direction: EdgeDirection::Forward,
        }
    }

    pub fn reverse(record: &PortalRecord) -> Self {
        Self {
            portal_id: record.portal_id.clone(),
            source: record.block_b.clone(),
            trigger: record.local_b,
            radius: record.radius,
            destination: record.block_a.clone(),
            destination_point: record.local_a,
            direction: EdgeDirection::Reverse,
        }
    }

    pub fn radius_sq(&self) -> f64 {
        self.radius * self.radius
    }

    /// Squared distance from `(x, z)` to the trigger, height excluded.
    pub fn planar_distance_sq(&self, x: f64, z: f64) -> f64 {
        let dx = x - self.trigger.x;
        let dz = z - self.trigger.z;
        dx * dx + dz * dz
    }

    /// Boundary-inclusive planar containment.
    pub fn contains_planar(&self, x: f64, z: f64) -> bool {
        self.planar_distance_sq(x, z) <= self.radius_sq()
    }

    /// Boundary-inclusive spherical containment (height included).
    pub fn contains_spatial(&self, p: DVec3) -> bool {
        p.distance_squared(self.trigger) <= self.radius_sq()
    }
}
