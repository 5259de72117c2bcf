//! CSV tables: one per image with its ranked keypoints, and the run summary.
//!
//! Headers are always written, so a set with no keypoints still produces a
//! readable (header-only) table.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::KeypointError;
use crate::keypoints::Keypoint;

pub const KEYPOINT_COLUMNS: [&str; 4] = ["index", "y", "x", "confidence"];
pub const SUMMARY_COLUMNS: [&str; 4] = [
    "image_name",
    "num_keypoints",
    "csv_path",
    "visualization_path",
];

/// One row of a per-image keypoint table. `index` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypointRow {
    pub index: usize,
    pub y: u32,
    pub x: u32,
    pub confidence: i64,
}

/// In-memory form of a per-image keypoint table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeypointTable {
    pub rows: Vec<KeypointRow>,
}

impl KeypointTable {
    /// Order by confidence, highest first, and number the rows.
    ///
    /// The sort is stable, so an already ranked set keeps its order.
    pub fn from_keypoints(keypoints: &[Keypoint]) -> Self {
        let mut ordered = keypoints.to_vec();
        ordered.sort_by(|a, b| b.confidence.cmp(&a.confidence));

        let rows = ordered
            .into_iter()
            .enumerate()
            .map(|(i, kp)| KeypointRow {
                index: i + 1,
                y: kp.y,
                x: kp.x,
                confidence: kp.confidence,
            })
            .collect();

        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keypoints(&self) -> Vec<Keypoint> {
        self.rows
            .iter()
            .map(|row| Keypoint {
                y: row.y,
                x: row.x,
                confidence: row.confidence,
            })
            .collect()
    }
}

/// One row of `processing_summary.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub image_name: String,
    pub num_keypoints: usize,
    pub csv_path: String,
    pub visualization_path: String,
}

fn write_table<T: Serialize>(
    rows: &[T],
    columns: &[&str],
    output_path: &Path,
) -> Result<(), KeypointError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(output_path)
        .map_err(|e| KeypointError::write(output_path, e))?;

    writer
        .write_record(columns)
        .map_err(|e| KeypointError::write(output_path, e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| KeypointError::write(output_path, e))?;
    }
    writer
        .flush()
        .map_err(|e| KeypointError::write(output_path, e))?;

    Ok(())
}

fn read_table<T: for<'de> Deserialize<'de>>(input_path: &Path) -> Result<Vec<T>, KeypointError> {
    let mut reader =
        csv::Reader::from_path(input_path).map_err(|e| KeypointError::read(input_path, e))?;

    reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|e| KeypointError::read(input_path, e))
}

/// Write a keypoint table and hand back what was written.
pub fn save_keypoints_to_csv(
    keypoints: &[Keypoint],
    output_path: &Path,
) -> Result<KeypointTable, KeypointError> {
    let table = KeypointTable::from_keypoints(keypoints);
    write_table(&table.rows, &KEYPOINT_COLUMNS, output_path)?;
    Ok(table)
}

/// Read a keypoint table written by [`save_keypoints_to_csv`].
pub fn read_keypoint_table(input_path: &Path) -> Result<KeypointTable, KeypointError> {
    Ok(KeypointTable {
        rows: read_table(input_path)?,
    })
}

pub fn save_summary_csv(rows: &[SummaryRow], output_path: &Path) -> Result<(), KeypointError> {
    write_table(rows, &SUMMARY_COLUMNS, output_path)
}

pub fn read_summary_csv(input_path: &Path) -> Result<Vec<SummaryRow>, KeypointError> {
    read_table(input_path)
}
