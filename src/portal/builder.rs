//! Build-time construction of portal records.
//!
//! Each hand-placed trigger in block A's local frame is mapped into block
//! B's local frame through the global frame:
//!
//! ```text
//! global  = T(A) · local_a
//! local_b = T(B)⁻¹ · global
//! ```

use std::io::Read;
use std::path::Path;

use glam::DVec3;
use tracing::{info, warn};

use super::PortalGraph;
use crate::config::{Directionality, PortalConfig};
use crate::model::*;
use crate::registry::RegistrySnapshot;
use crate::storage::BlockStore;
use crate::{Error, Result};

pub struct PortalGraphBuilder<'a> {
    snapshot: &'a RegistrySnapshot,
    config: PortalConfig,
    records: Vec<PortalRecord>,
}

impl<'a> PortalGraphBuilder<'a> {
    pub fn new(snapshot: &'a RegistrySnapshot, config: PortalConfig) -> Self {
        Self { snapshot, config, records: Vec::new() }
    }

    /// Add a portal from `local_a` in `block_a` to the same physical spot
    /// in `block_b`.
    pub fn add_portal(
        &mut self,
        block_a: &BlockId,
        local_a: DVec3,
        block_b: &BlockId,
        radius: f64,
    ) -> Result<&PortalRecord> {
        if block_a == block_b {
            return Err(Error::MalformedInput(format!("portal from '{block_a}' to itself")));
        }
        if !local_a.is_finite() {
            return Err(Error::MalformedInput(format!(
                "portal trigger in '{block_a}' is not finite"
            )));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::MalformedInput(format!("portal radius must be positive, got {radius}")));
        }
        let t_a = self.snapshot.get_transform(block_a)?;
        let t_b = self.snapshot.get_transform(block_b)?;

        let global = t_a.transform_point(local_a);
        let local_b = t_b.inverse().transform_point(global);

        let index = self.records.len();
        let portal_id = format!("{block_a}_to_{block_b}_{index}");
        self.records.push(PortalRecord {
            portal_id,
            block_a: block_a.clone(),
            local_a,
            block_b: block_b.clone(),
            local_b,
            radius,
            bidirectional: self.config.directionality == Directionality::Bidirectional,
        });
        Ok(&self.records[index])
    }

    /// Add a hand-written `(block_a, x_a, z_a, block_b)` request with the
    /// configured radius and trigger height.
    pub fn add_request(&mut self, request: &PortalRequest) -> Result<&PortalRecord> {
        let local_a = DVec3::new(request.x_a, self.config.height.trigger_height(), request.z_a);
        let radius = self.config.default_radius;
        self.add_portal(&request.block_a, local_a, &request.block_b, radius)
    }

    /// Read header-less `block_a, x_a, z_a, block_b` rows. Returns the
    /// number of portals added; stops at the first bad row.
    pub fn add_requests_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut added = 0;
        for row in csv.deserialize::<PortalRequest>() {
            self.add_request(&row?)?;
            added += 1;
        }
        Ok(added)
    }

    pub fn add_requests_csv_path(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        self.add_requests_csv(std::fs::File::open(path)?)
    }

    pub fn records(&self) -> &[PortalRecord] {
        &self.records
    }

    pub fn build(&self) -> PortalGraph {
        let graph = PortalGraph::from_records(&self.records, &self.config);
        for (edge, trigger) in graph.overlapping_arrivals() {
            warn!(portal = %edge, inside = %trigger,
                "portal arrival lies inside another trigger; relying on navigation hysteresis");
        }
        graph
    }

    /// Replace the store's portal table with these records and return the
    /// built graph.
    pub async fn commit<S: BlockStore + ?Sized>(&self, store: &S) -> Result<PortalGraph> {
        store.replace_portals(&self.records).await?;
        info!(portals = self.records.len(), "portal table rebuilt");
        Ok(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeightPolicy;
    use std::f64::consts::FRAC_PI_2;

    fn snapshot() -> RegistrySnapshot {
        RegistrySnapshot::from_blocks([
            Block::anchor("A".into(), None),
            Block::registered(
                "B".into(),
                RigidTransform::from_translation(DVec3::new(2.0, 0.0, 3.0)),
                None,
            ),
            Block::registered(
                "R".into(),
                RigidTransform::from_yaw_translation(FRAC_PI_2, DVec3::new(10.0, 0.0, 0.0)),
                None,
            ),
        ])
    }

    #[test]
    fn test_endpoints_denote_same_place() {
        let snap = snapshot();
        let mut builder = PortalGraphBuilder::new(&snap, PortalConfig::default());
        let rec = builder
            .add_portal(&"A".into(), DVec3::new(2.0, 0.0, 3.0), &"B".into(), 0.5)
            .unwrap()
            .clone();
        assert!(rec.local_b.abs_diff_eq(DVec3::ZERO, 1e-12));
        assert_eq!(rec.portal_id, "A_to_B_0");

        let rec = builder
            .add_portal(&"B".into(), DVec3::new(1.0, 0.0, -1.0), &"R".into(), 0.5)
            .unwrap()
            .clone();
        let t_b = snap.get_transform(&"B".into()).unwrap();
        let t_r = snap.get_transform(&"R".into()).unwrap();
        assert!(t_b
            .transform_point(rec.local_a)
            .abs_diff_eq(t_r.transform_point(rec.local_b), 1e-12));
        assert_eq!(rec.portal_id, "B_to_R_1");
    }

    #[test]
    fn test_unregistered_block_is_not_found() {
        let snap = snapshot();
        let mut builder = PortalGraphBuilder::new(&snap, PortalConfig::default());
        let err = builder.add_portal(&"A".into(), DVec3::ZERO, &"Q".into(), 0.5).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(builder.records().is_empty());
    }

    #[test]
    fn test_bad_radius_rejected() {
        let snap = snapshot();
        let mut builder = PortalGraphBuilder::new(&snap, PortalConfig::default());
        assert!(builder.add_portal(&"A".into(), DVec3::ZERO, &"B".into(), 0.0).is_err());
        assert!(builder.add_portal(&"A".into(), DVec3::ZERO, &"A".into(), 1.0).is_err());
    }

    #[test]
    fn test_csv_requests_use_config() {
        let snap = snapshot();
        let config = PortalConfig {
            height: HeightPolicy::FixedY(1.5),
            default_radius: 0.75,
            ..Default::default()
        };
        let mut builder = PortalGraphBuilder::new(&snap, config);
        let csv = "A, 2.0, 3.0, B\nB,0,0,A\n";
        assert_eq!(builder.add_requests_csv(csv.as_bytes()).unwrap(), 2);
        let first = &builder.records()[0];
        assert_eq!(first.local_a, DVec3::new(2.0, 1.5, 3.0));
        assert_eq!(first.radius, 0.75);
        assert!(first.local_b.abs_diff_eq(DVec3::new(0.0, 1.5, 0.0), 1e-12));
        assert_eq!(builder.build().edge_count(), 4);
    }

    #[test]
    fn test_csv_bad_row_is_error() {
        let snap = snapshot();
        let mut builder = PortalGraphBuilder::new(&snap, PortalConfig::default());
        assert!(matches!(
            builder.add_requests_csv("A,not-a-number,3,B\n".as_bytes()),
            Err(Error::Csv(_))
        ));
    }
}
