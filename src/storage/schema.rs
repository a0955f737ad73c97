//! Row layout of the durable store.
//!
//! ```text
//! block_transforms(block_name PK, t00..t33, aabb_min_x/y/z?, aabb_max_x/y/z?, status?)
//! portals(portal_id PK, block_a, local_x_a, local_z_a, block_b, local_x_b, local_z_b, radius,
//!         local_y_a?, local_y_b?, bidirectional?)
//! ```
//!
//! Columns marked `?` are optional; rows written by older tools without
//! them still load.

use chrono::{DateTime, Utc};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::{Error, Result};

pub const BLOCK_TRANSFORMS_TABLE: &str = "block_transforms";
pub const PORTALS_TABLE: &str = "portals";

/// One row of `block_transforms`.
#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTransformRow {
    pub block_name: String,
    pub t00: f64, pub t01: f64, pub t02: f64, pub t03: f64,
    pub t10: f64, pub t11: f64, pub t12: f64, pub t13: f64,
    pub t20: f64, pub t21: f64, pub t22: f64, pub t23: f64,
    pub t30: f64, pub t31: f64, pub t32: f64, pub t33: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aabb_min_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aabb_min_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aabb_min_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aabb_max_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aabb_max_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aabb_max_z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RegistrationStatus>,
}

impl BlockTransformRow {
    #[rustfmt::skip]
    fn values(&self) -> [f64; 16] {
        [
            self.t00, self.t01, self.t02, self.t03,
            self.t10, self.t11, self.t12, self.t13,
            self.t20, self.t21, self.t22, self.t23,
            self.t30, self.t31, self.t32, self.t33,
        ]
    }

    fn aabb(&self) -> Option<Aabb> {
        Some(Aabb::new(
            DVec3::new(self.aabb_min_x?, self.aabb_min_y?, self.aabb_min_z?),
            DVec3::new(self.aabb_max_x?, self.aabb_max_y?, self.aabb_max_z?),
        ))
    }

    /// Decode and validate. A row without a `status` column is an anchor
    /// exactly when its transform is identity.
    pub fn to_block(&self) -> Result<Block> {
        let transform = RigidTransform::try_from_row_major(&self.values()).map_err(|e| {
            Error::MalformedInput(format!("block '{}': {e}", self.block_name))
        })?;
        let status = self.status.unwrap_or(if transform.is_identity() {
            RegistrationStatus::Anchor
        } else {
            RegistrationStatus::Registered
        });
        if status == RegistrationStatus::Anchor && !transform.is_identity() {
            return Err(Error::MalformedInput(format!(
                "anchor block '{}' has a non-identity transform",
                self.block_name
            )));
        }
        Ok(Block {
            id: BlockId::new(self.block_name.clone()),
            transform,
            aabb: self.aabb(),
            status,
        })
    }
}

impl From<&Block> for BlockTransformRow {
    #[rustfmt::skip]
    fn from(block: &Block) -> Self {
        let [t00, t01, t02, t03, t10, t11, t12, t13, t20, t21, t22, t23, t30, t31, t32, t33] =
            block.transform.to_row_major();
        let (min, max) = match block.aabb {
            Some(a) => (Some(a.min), Some(a.max)),
            None => (None, None),
        };
        Self {
            block_name: block.id.0.clone(),
            t00, t01, t02, t03,
            t10, t11, t12, t13,
            t20, t21, t22, t23,
            t30, t31, t32, t33,
            aabb_min_x: min.map(|v| v.x),
            aabb_min_y: min.map(|v| v.y),
            aabb_min_z: min.map(|v| v.z),
            aabb_max_x: max.map(|v| v.x),
            aabb_max_y: max.map(|v| v.y),
            aabb_max_z: max.map(|v| v.z),
            status: Some(block.status),
        }
    }
}

/// One row of `portals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalRow {
    pub portal_id: String,
    pub block_a: String,
    pub local_x_a: f64,
    pub local_z_a: f64,
    pub block_b: String,
    pub local_x_b: f64,
    pub local_z_b: f64,
    pub radius: f64,
    #[serde(default)]
    pub local_y_a: f64,
    #[serde(default)]
    pub local_y_b: f64,
    /// Rows written before this column existed were loaded both ways.
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

fn default_bidirectional() -> bool {
    true
}

impl PortalRow {
    pub fn to_record(&self) -> Result<PortalRecord> {
        let record = PortalRecord {
            portal_id: self.portal_id.clone(),
            block_a: BlockId::new(self.block_a.clone()),
            local_a: DVec3::new(self.local_x_a, self.local_y_a, self.local_z_a),
            block_b: BlockId::new(self.block_b.clone()),
            local_b: DVec3::new(self.local_x_b, self.local_y_b, self.local_z_b),
            radius: self.radius,
            bidirectional: self.bidirectional,
        };
        if !(record.local_a.is_finite() && record.local_b.is_finite()) {
            return Err(Error::MalformedInput(format!(
                "portal '{}' has non-finite coordinates",
                self.portal_id
            )));
        }
        if !(record.radius.is_finite() && record.radius > 0.0) {
            return Err(Error::MalformedInput(format!(
                "portal '{}' has invalid radius {}",
                self.portal_id, self.radius
            )));
        }
        Ok(record)
    }
}

impl From<&PortalRecord> for PortalRow {
    fn from(r: &PortalRecord) -> Self {
        Self {
            portal_id: r.portal_id.clone(),
            block_a: r.block_a.0.clone(),
            local_x_a: r.local_a.x,
            local_z_a: r.local_a.z,
            block_b: r.block_b.0.clone(),
            local_x_b: r.local_b.x,
            local_z_b: r.local_b.z,
            radius: r.radius,
            local_y_a: r.local_a.y,
            local_y_b: r.local_b.y,
            bidirectional: r.bidirectional,
        }
    }
}

/// The whole store: both tables plus a write stamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub block_transforms: Vec<BlockTransformRow>,
    pub portals: Vec<PortalRow>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoreDocument {
    /// Parse a document, reporting missing tables or columns as `Schema`.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Schema("store document is not a JSON object".into()))?;
        for table in [BLOCK_TRANSFORMS_TABLE, PORTALS_TABLE] {
            match obj.get(table) {
                Some(serde_json::Value::Array(_)) => {}
                Some(_) => return Err(Error::Schema(format!("table '{table}' is not a row list"))),
                None => return Err(Error::Schema(format!("missing table '{table}'"))),
            }
        }
        serde_json::from_value(value).map_err(|e| Error::Schema(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn blocks(&self) -> Result<Vec<Block>> {
        self.block_transforms.iter().map(BlockTransformRow::to_block).collect()
    }

    pub fn portal_records(&self) -> Result<Vec<PortalRecord>> {
        self.portals.iter().map(PortalRow::to_record).collect()
    }

    pub fn find_block(&self, id: &BlockId) -> Option<&BlockTransformRow> {
        self.block_transforms.iter().find(|r| r.block_name == id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_row_round_trip() {
        let block = Block::registered(
            BlockId::from("B"),
            RigidTransform::from_translation(DVec3::new(1.0, 0.0, 0.0)),
            Some(Aabb::new(DVec3::ZERO, DVec3::ONE)),
        );
        let row = BlockTransformRow::from(&block);
        assert_eq!(row.t03, 1.0);
        assert_eq!(row.t33, 1.0);
        assert_eq!(row.to_block().unwrap(), block);
    }

    #[test]
    fn test_legacy_row_without_status_or_aabb() {
        let json = r#"{"block_name":"A",
            "t00":1,"t01":0,"t02":0,"t03":0,
            "t10":0,"t11":1,"t12":0,"t13":0,
            "t20":0,"t21":0,"t22":1,"t23":0,
            "t30":0,"t31":0,"t32":0,"t33":1}"#;
        let row: BlockTransformRow = serde_json::from_str(json).unwrap();
        let block = row.to_block().unwrap();
        assert!(block.is_anchor());
        assert_eq!(block.aabb, None);
    }

    #[test]
    fn test_missing_table_is_schema_error() {
        let err = StoreDocument::from_json(r#"{"block_transforms": []}"#).unwrap_err();
        assert!(matches!(err, Error::Schema(ref m) if m.contains("portals")));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let err = StoreDocument::from_json(
            r#"{"block_transforms": [{"block_name": "A", "t00": 1.0}], "portals": []}"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_portal_row_defaults_height() {
        let row: PortalRow = serde_json::from_str(
            r#"{"portal_id":"A_to_B_0","block_a":"A","local_x_a":2,"local_z_a":3,
                "block_b":"B","local_x_b":0,"local_z_b":0,"radius":0.5}"#,
        )
        .unwrap();
        let record = row.to_record().unwrap();
        assert_eq!(record.local_a, DVec3::new(2.0, 0.0, 3.0));
        assert!(record.bidirectional);
    }

    #[test]
    fn test_portal_row_keeps_direction() {
        let record = PortalRecord {
            portal_id: "A_to_B_0".into(),
            block_a: "A".into(),
            local_a: DVec3::new(2.0, 0.0, 3.0),
            block_b: "B".into(),
            local_b: DVec3::ZERO,
            radius: 0.5,
            bidirectional: false,
        };
        let row = PortalRow::from(&record);
        let json = serde_json::to_string(&row).unwrap();
        let back: PortalRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_record().unwrap(), record);
    }
}
