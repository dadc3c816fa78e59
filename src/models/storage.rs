use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One storage measurement of a repository.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub id: Uuid,
    pub repository_id: Uuid,
    pub total_size: i64,
    pub total_file_count: i64,
    pub raw_data_size: i64,
    pub restore_size: i64,
    pub dedup_ratio: f64,
    pub space_saved: i64,
    pub space_saved_pct: f64,
    pub snapshot_count: i64,
    pub collected_at: DateTime<Utc>,
}

/// Totals over the latest measurement of every repository in scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatsSummary {
    pub total_raw_size: i64,
    pub total_restore_size: i64,
    pub total_space_saved: i64,
    pub avg_dedup_ratio: f64,
    pub repository_count: i64,
    pub total_snapshots: i64,
}
