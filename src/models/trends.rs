use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSuccessRate {
    pub period: String, // "7d" or "30d"
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub success_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageGrowthPoint {
    pub date: NaiveDate,
    pub raw_data_size: i64,
    pub restore_size: i64,
    pub snapshot_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDurationPoint {
    pub date: NaiveDate,
    pub avg_duration_ms: f64,
    pub max_duration_ms: i64,
    pub min_duration_ms: i64,
    pub backup_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBackupStats {
    pub date: NaiveDate,
    pub total: i64,
    pub successful: i64,
    pub failed: i64,
    pub total_size: i64,
}
