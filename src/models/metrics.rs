use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Point-in-time metrics snapshot for one organization.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsHistory {
    pub id: Uuid,
    pub org_id: Uuid,
    pub backup_count: i64,
    pub backup_success_count: i64,
    pub backup_failed_count: i64,
    pub backup_total_size: i64,
    /// Milliseconds.
    pub backup_total_duration: i64,
    pub agent_total_count: i64,
    pub agent_online_count: i64,
    pub agent_offline_count: i64,
    pub storage_used_bytes: i64,
    pub storage_raw_bytes: i64,
    pub storage_space_saved: i64,
    pub repository_count: i64,
    pub total_snapshots: i64,
    pub created_at: DateTime<Utc>,
}

impl MetricsHistory {
    pub fn new(org_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            backup_count: 0,
            backup_success_count: 0,
            backup_failed_count: 0,
            backup_total_size: 0,
            backup_total_duration: 0,
            agent_total_count: 0,
            agent_online_count: 0,
            agent_offline_count: 0,
            storage_used_bytes: 0,
            storage_raw_bytes: 0,
            storage_space_saved: 0,
            repository_count: 0,
            total_snapshots: 0,
            created_at: Utc::now(),
        }
    }
}

/// Rollup of one organization's backups over one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDailySummary {
    pub id: Uuid,
    pub org_id: Uuid,
    /// UTC midnight of the summarized day.
    pub date: DateTime<Utc>,
    pub total_backups: i64,
    pub successful_backups: i64,
    pub failed_backups: i64,
    pub total_size_bytes: i64,
    pub total_duration_secs: i64,
    pub agents_active: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live view backing the organization dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub agent_total: i64,
    pub agent_online: i64,
    pub agent_offline: i64,
    pub backup_total: i64,
    pub backup_running: i64,
    pub backup_failed_24h: i64,
    pub repository_count: i64,
    pub schedule_count: i64,
    pub schedule_enabled: i64,
    pub total_raw_size: i64,
    pub total_backup_size: i64,
    pub total_space_saved: i64,
    pub avg_dedup_ratio: f64,
    pub success_rate_7d: f64,
    pub success_rate_30d: f64,
}
