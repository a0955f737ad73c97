//! Block point sets from NeRF `transforms.json` files.
//!
//! A block's registration points are its training camera centres: the
//! translation column of every `frames[].transform_matrix`.

use std::path::Path;

use glam::DVec3;
use serde::Deserialize;

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
pub(crate) struct TransformsFile {
    pub frames: Vec<Frame>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Frame {
    pub transform_matrix: Vec<Vec<f64>>,
}

impl Frame {
    pub fn rows(&self) -> Result<[[f64; 4]; 4]> {
        let mut rows = [[0.0, 0.0, 0.0, 1.0]; 4];
        if !(3..=4).contains(&self.transform_matrix.len()) {
            return Err(Error::MalformedInput(format!(
                "transform_matrix has {} rows, expected 3 or 4",
                self.transform_matrix.len()
            )));
        }
        for (i, row) in self.transform_matrix.iter().enumerate() {
            rows[i] = row.as_slice().try_into().map_err(|_| {
                Error::MalformedInput(format!("transform_matrix row {i} has {} columns", row.len()))
            })?;
        }
        Ok(rows)
    }
}

/// Parse camera centres out of a `transforms.json` document.
pub fn camera_centers_from_json(text: &str) -> Result<Vec<DVec3>> {
    let file: TransformsFile = serde_json::from_str(text)?;
    if file.frames.is_empty() {
        return Err(Error::MalformedInput("transforms file has no frames".into()));
    }
    file.frames
        .iter()
        .map(|frame| {
            let rows = frame.rows()?;
            let center = DVec3::new(rows[0][3], rows[1][3], rows[2][3]);
            if !center.is_finite() {
                return Err(Error::MalformedInput("camera centre is not finite".into()));
            }
            Ok(center)
        })
        .collect()
}

pub fn load_camera_centers(path: impl AsRef<Path>) -> Result<Vec<DVec3>> {
    camera_centers_from_json(&std::fs::read_to_string(path)?)
}
