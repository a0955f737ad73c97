//! Export of human-readable registry dumps and aligned camera files.
//!
//! ```text
//! RegistrySnapshot → export_registry_dump() → text report
//! transforms.json + T(block) → export_aligned_frames() → transforms.json in the global frame
//! ```
//!
//! The aligned file keeps every other key of the input untouched, so it
//! can be fed straight back to the reconstruction tooling.

use std::io::Write;
use std::path::Path;

use glam::DMat4;
use serde_json::Value;

use crate::model::*;
use crate::registration::camera_centers::Frame;
use crate::registry::RegistrySnapshot;
use crate::{Error, Result};

/// Write every block, anchor first, with its global transform and bounds.
pub fn export_registry_dump(snapshot: &RegistrySnapshot, writer: &mut dyn Write) -> Result<()> {
    writeln!(writer, "# block-stitch registry")?;
    writeln!(writer, "# blocks: {}", snapshot.len())?;

    for block in snapshot.blocks() {
        writeln!(writer)?;
        let status = match block.status {
            RegistrationStatus::Anchor => "anchor",
            RegistrationStatus::Registered => "registered",
        };
        writeln!(writer, "[{}] {}", block.id, status)?;
        for row in block.transform.to_rows() {
            writeln!(writer, "  {}", format_row(&row))?;
        }
        match &block.aabb {
            Some(aabb) => writeln!(
                writer,
                "  aabb min=({:.4}, {:.4}, {:.4}) max=({:.4}, {:.4}, {:.4})",
                aabb.min.x, aabb.min.y, aabb.min.z, aabb.max.x, aabb.max.y, aabb.max.z
            )?,
            None => writeln!(writer, "  aabb none")?,
        }
    }
    Ok(())
}

fn format_row(row: &[f64; 4]) -> String {
    row.iter()
        .map(|v| format!("{v:>10.4}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Premultiply every `frames[].transform_matrix` of a `transforms.json`
/// document by `transform`, returning the rewritten document.
///
/// Output matrices are always 4×4.
pub fn export_aligned_frames(input: &str, transform: &RigidTransform) -> Result<String> {
    let mut doc: Value = serde_json::from_str(input)?;
    let frames = doc
        .get_mut("frames")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| Error::MalformedInput("transforms file has no frames array".into()))?;

    for frame in frames.iter_mut() {
        let slot = frame
            .get_mut("transform_matrix")
            .ok_or_else(|| Error::MalformedInput("frame without transform_matrix".into()))?;
        let parsed = Frame { transform_matrix: serde_json::from_value(slot.take())? };
        let camera = DMat4::from_cols_array_2d(&parsed.rows()?).transpose();
        let aligned = transform.matrix() * camera;
        *slot = serde_json::to_value(aligned.transpose().to_cols_array_2d())?;
    }
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// File-to-file variant of [`export_aligned_frames`].
pub fn export_aligned_frames_path(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    transform: &RigidTransform,
) -> Result<()> {
    let text = std::fs::read_to_string(input)?;
    std::fs::write(output, export_aligned_frames(&text, transform)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dump_lists_anchor_first() {
        let snapshot = RegistrySnapshot::from_blocks([
            Block::registered(
                "B".into(),
                RigidTransform::from_translation(DVec3::new(2.0, 0.0, 3.0)),
                None,
            ),
            Block::anchor("A".into(), Some(Aabb::new(DVec3::ZERO, DVec3::ONE))),
        ]);
        let mut out = Vec::new();
        export_registry_dump(&snapshot, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("# block-stitch registry\n# blocks: 2\n"));
        let a = text.find("[A] anchor").unwrap();
        let b = text.find("[B] registered").unwrap();
        assert!(a < b);
        assert!(text.contains("aabb min=(0.0000, 0.0000, 0.0000) max=(1.0000, 1.0000, 1.0000)"));
        assert!(text.contains("aabb none"));
        assert!(text.contains("    2.0000"));
    }

    #[test]
    fn test_aligned_frames_move_camera_centres() {
        let input = r#"{
            "camera_angle_x": 0.69,
            "frames": [
                { "file_path": "images/0001.png",
                  "transform_matrix": [[1,0,0,1],[0,1,0,0],[0,0,1,0]] }
            ]
        }"#;
        let t = RigidTransform::from_translation(DVec3::new(10.0, 0.0, -1.0));
        let out = export_aligned_frames(input, &t).unwrap();
        let doc: Value = serde_json::from_str(&out).unwrap();

        assert_eq!(doc["camera_angle_x"], serde_json::json!(0.69));
        assert_eq!(doc["frames"][0]["file_path"], "images/0001.png");
        let centers = crate::registration::camera_centers_from_json(&out).unwrap();
        assert_eq!(centers, vec![DVec3::new(11.0, 0.0, -1.0)]);
        assert_eq!(doc["frames"][0]["transform_matrix"][3], serde_json::json!([0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_aligned_frames_reject_missing_frames() {
        let t = RigidTransform::IDENTITY;
        assert!(matches!(
            export_aligned_frames(r#"{"camera_angle_x": 1}"#, &t),
            Err(Error::MalformedInput(_))
        ));
    }
}
