//! # Portal Graph
//!
//! Explicit adjacency: block id → ordered, immutable list of outgoing
//! trigger edges. Built once from stored [`PortalRecord`]s, each of which
//! carries the directionality chosen when it was built; never mutated
//! afterwards.
//!
//! | Query | Distance | Notes |
//! |-------|----------|-------|
//! | `contains` | planar (x, z) | always height-free |
//! | `contains_point` | per `HeightPolicy` | spherical for `carry_y` |
//!
//! Both return the first matching edge in insertion order; the circle
//! boundary counts as inside.

mod builder;

use glam::DVec3;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::config::{HeightPolicy, PortalConfig};
use crate::model::*;

pub use builder::PortalGraphBuilder;

type EdgeList = SmallVec<[PortalEdge; 4]>;

#[derive(Debug, Clone, Default)]
pub struct PortalGraph {
    edges: HashMap<BlockId, EdgeList>,
    height: HeightPolicy,
}

impl PortalGraph {
    /// Build adjacency from stored records. Bidirectional records also get
    /// the reverse edge on `block_b`. Only the height policy is taken from
    /// `config`; directionality was fixed when the records were built.
    pub fn from_records(records: &[PortalRecord], config: &PortalConfig) -> Self {
        let mut edges: HashMap<BlockId, EdgeList> = HashMap::new();
        for record in records {
            edges
                .entry(record.block_a.clone())
                .or_default()
                .push(PortalEdge::forward(record));
            if record.bidirectional {
                edges
                    .entry(record.block_b.clone())
                    .or_default()
                    .push(PortalEdge::reverse(record));
            }
        }
        Self { edges, height: config.height }
    }

    pub fn height_policy(&self) -> HeightPolicy {
        self.height
    }

    /// Outgoing edges of `block`, empty for unknown blocks.
    pub fn edges_from(&self, block: &BlockId) -> &[PortalEdge] {
        self.edges.get(block).map(|e| e.as_slice()).unwrap_or(&[])
    }

    /// First edge of `block` whose trigger circle holds `(x, z)`.
    pub fn contains(&self, block: &BlockId, x: f64, z: f64) -> Option<&PortalEdge> {
        self.edges_from(block).iter().find(|e| e.contains_planar(x, z))
    }

    /// Like [`contains`](Self::contains) but honours the height policy.
    pub fn contains_point(&self, block: &BlockId, p: DVec3) -> Option<&PortalEdge> {
        match self.height {
            HeightPolicy::CarryY => self.edges_from(block).iter().find(|e| e.contains_spatial(p)),
            HeightPolicy::IgnoreY | HeightPolicy::FixedY(_) => self.contains(block, p.x, p.z),
        }
    }

    /// Edges whose arrival point already lies inside another trigger on
    /// the destination block, as `(edge portal id, trigger portal id)`.
    ///
    /// For bidirectional graphs the reverse edge of the same portal is
    /// skipped: arriving inside it is expected.
    pub fn overlapping_arrivals(&self) -> Vec<(String, String)> {
        let mut hits = Vec::new();
        for edge in self.edges.values().flat_map(|list| list.iter()) {
            let arrival = edge.destination_point;
            for other in self.edges_from(&edge.destination) {
                if other.portal_id == edge.portal_id {
                    continue;
                }
                let inside = match self.height {
                    HeightPolicy::CarryY => other.contains_spatial(arrival),
                    _ => other.contains_planar(arrival.x, arrival.z),
                };
                if inside {
                    hits.push((edge.portal_id.clone(), other.portal_id.clone()));
                }
            }
        }
        hits.sort();
        hits
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BlockId> {
        self.edges.keys()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|e| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edge_count() == 0
    }
}
