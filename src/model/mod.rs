//! # Block Model
//!
//! Pure data shared by the registry, the registration coordinator, the
//! portal graph and the navigation controller.
//!
//! Design rule: no I/O, no locks, no async in this module.

pub mod aabb;
pub mod block;
pub mod portal;
pub mod pose;
pub mod transform;

pub use aabb::{Aabb, compute_aabb};
pub use block::{Block, BlockId, RegistrationStatus};
pub use portal::{EdgeDirection, PortalEdge, PortalRecord, PortalRequest};
pub use pose::Pose;
pub use transform::{ORTHONORMAL_TOLERANCE, RigidTransform};
