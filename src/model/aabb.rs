//! Axis-aligned bounding boxes in the global frame.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::RigidTransform;
use crate::{Error, Result};

/// Global axis-aligned bounding box of a block's content.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Map `points` through `transform` and return their per-axis min/max.
///
/// Fails on an empty slice or any non-finite point.
pub fn compute_aabb(points: &[DVec3], transform: &RigidTransform) -> Result<Aabb> {
    let mut iter = points.iter();
    let first = iter
        .next()
        .ok_or_else(|| Error::MalformedInput("cannot bound an empty point set".into()))?;
    if !first.is_finite() {
        return Err(Error::MalformedInput("point set contains non-finite coordinates".into()));
    }
    let seed = transform.transform_point(*first);
    let mut aabb = Aabb::new(seed, seed);
    for p in iter {
        if !p.is_finite() {
            return Err(Error::MalformedInput("point set contains non-finite coordinates".into()));
        }
        let g = transform.transform_point(*p);
        aabb.min = aabb.min.min(g);
        aabb.max = aabb.max.max(g);
    }
    Ok(aabb)
}
