//! Per-image result table and CSV persistence.
//!
//! One row per surviving track, columns fixed by the downstream analysis
//! scripts. Files are written atomically (temp file in the destination
//! directory, then rename) so a concurrent reader never observes a partial
//! table. The matching reader exists so the MOTILE column can be recomputed
//! from an already-exported table without re-running detection or linking.

use std::path::Path;

use crate::classify::motile_label;
use crate::config::TrackingConfig;
use crate::error::TrackingError;

/// Column names of the exported table, in order. Written unconditionally so
/// a table with zero surviving tracks still has its header row.
const COLUMNS: [&str; 11] = [
    "LABEL",
    "TRACK_ID",
    "NUMBER_SPOTS",
    "NUMBER_GAPS",
    "TRACK_DURATION",
    "TRACK_DISPLACEMENT",
    "TRACK_MEAN_SPEED",
    "TOTAL_DISTANCE_TRAVELED",
    "MEAN_STRAIGHT_LINE_SPEED",
    "LINEARITY_OF_FORWARD_PROGRESSION",
    "MOTILE",
];

/// One exported track record.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrackRow {
    /// Human-readable track label, `Track_<id>`.
    #[serde(rename = "LABEL")]
    pub label: String,
    #[serde(rename = "TRACK_ID")]
    pub track_id: u64,
    #[serde(rename = "NUMBER_SPOTS")]
    pub number_spots: usize,
    #[serde(rename = "NUMBER_GAPS")]
    pub number_gaps: usize,
    /// Seconds.
    #[serde(rename = "TRACK_DURATION")]
    pub track_duration: f64,
    /// µm.
    #[serde(rename = "TRACK_DISPLACEMENT")]
    pub track_displacement: f64,
    /// µm/s.
    #[serde(rename = "TRACK_MEAN_SPEED")]
    pub track_mean_speed: f64,
    /// µm.
    #[serde(rename = "TOTAL_DISTANCE_TRAVELED")]
    pub total_distance_traveled: f64,
    /// µm/s.
    #[serde(rename = "MEAN_STRAIGHT_LINE_SPEED")]
    pub mean_straight_line_speed: f64,
    /// Dimensionless, in [0, 1].
    #[serde(rename = "LINEARITY_OF_FORWARD_PROGRESSION")]
    pub linearity_of_forward_progression: f64,
    /// 1 = motile, 0 = non-motile, empty = unknown.
    #[serde(rename = "MOTILE")]
    pub motile: Option<u8>,
}

/// Result table for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTable {
    /// Rows in track-id order.
    pub rows: Vec<TrackRow>,
}

impl TrackTable {
    /// Serialize to CSV at `path`, atomically.
    ///
    /// Writes `<path>.tmp` in the same directory and renames over the
    /// destination, so readers see either the old table or the complete new
    /// one.
    pub fn write_csv(&self, path: &Path) -> Result<(), TrackingError> {
        let tmp_path = path.with_extension("csv.tmp");
        let write = || -> Result<(), std::io::Error> {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(&tmp_path)?;
            writer.write_record(COLUMNS)?;
            for row in &self.rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
            drop(writer);
            std::fs::rename(&tmp_path, path)
        };
        write().map_err(|source| {
            // best effort: do not leave the partial temp file behind
            let _ = std::fs::remove_file(&tmp_path);
            TrackingError::OutputWrite {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Read a previously exported table back.
    pub fn read_csv(path: &Path) -> Result<Self, TrackingError> {
        let mut reader = csv::Reader::from_path(path).map_err(|e| TrackingError::OutputWrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: TrackRow = record.map_err(|e| TrackingError::OutputWrite {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            })?;
            rows.push(row);
        }
        Ok(Self { rows })
    }

    /// Recompute every MOTILE label from the exported mean speeds.
    ///
    /// Classification is an annotation over already-exported values, so it
    /// can be redone with a different threshold without re-tracking.
    pub fn annotate_motile(&mut self, config: &TrackingConfig) {
        for row in &mut self.rows {
            row.motile = motile_label(Some(row.track_mean_speed), config);
        }
    }
}
