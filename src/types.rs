use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::template::LabelSet;

/// Measured usage of one matched directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Directory name under the storage root. Not exported as a metric label.
    pub name: String,
    pub size_bytes: u64,
    pub labels: LabelSet,
}

/// Whole-filesystem view of the device hosting the storage root.
///
/// The zero value stands for "unknown", e.g. after a failed `statvfs`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemStats {
    pub capacity_bytes: u64,
    pub used_bytes: u64,
}

/// The complete result of one scan cycle. Never mutated after install.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub data_points: Vec<DataPoint>,
    pub fs_stats: FilesystemStats,
    /// `None` until the first cycle completes.
    pub taken_at: Option<DateTime<Utc>>,
    pub scan_duration_ms: u64,
}

impl Snapshot {
    pub fn is_initial(&self) -> bool {
        self.taken_at.is_none()
    }

    pub fn total_bytes(&self) -> u64 {
        self.data_points.iter().fold(0u64, |acc, dp| acc.saturating_add(dp.size_bytes))
    }
}

// DTOs for the JSON snapshot endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPointDto {
    pub name: String,
    pub size_bytes: u64,
    pub labels: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDto {
    pub template: String,
    pub label_names: Vec<String>,
    pub data_points: Vec<DataPointDto>,
    pub fs_stats: FilesystemStats,
    pub total_bytes: u64,
    pub taken_at: Option<DateTime<Utc>>,
    pub scan_duration_ms: u64,
}

impl SnapshotDto {
    pub fn from_snapshot(snapshot: &Snapshot, template: &str, label_names: &[String]) -> Self {
        let data_points = snapshot
            .data_points
            .iter()
            .map(|dp| DataPointDto {
                name: dp.name.clone(),
                size_bytes: dp.size_bytes,
                labels: label_names
                    .iter()
                    .cloned()
                    .zip(dp.labels.iter().cloned().map(serde_json::Value::String))
                    .collect(),
            })
            .collect();
        Self {
            template: template.to_string(),
            label_names: label_names.to_vec(),
            data_points,
            fs_stats: snapshot.fs_stats,
            total_bytes: snapshot.total_bytes(),
            taken_at: snapshot.taken_at,
            scan_duration_ms: snapshot.scan_duration_ms,
        }
    }
}
