//! A registered block.

use serde::{Deserialize, Serialize};

use super::{Aabb, RigidTransform};

/// Unique block identifier (the snapshot / directory name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a block entered the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Root of the global frame; transform is exactly identity.
    Anchor,
    /// Resolved by one pairwise alignment against a registered block.
    Registered,
}

/// A block with its resolved local-to-global transform.
///
/// Immutable once created; the registry never replaces an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub transform: RigidTransform,
    pub aabb: Option<Aabb>,
    pub status: RegistrationStatus,
}

impl Block {
    pub fn anchor(id: BlockId, aabb: Option<Aabb>) -> Self {
        Self {
            id,
            transform: RigidTransform::IDENTITY,
            aabb,
            status: RegistrationStatus::Anchor,
        }
    }

    pub fn registered(id: BlockId, transform: RigidTransform, aabb: Option<Aabb>) -> Self {
        Self {
            id,
            transform,
            aabb,
            status: RegistrationStatus::Registered,
        }
    }

    pub fn is_anchor(&self) -> bool {
        self.status == RegistrationStatus::Anchor
    }
}
