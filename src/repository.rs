use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::agent::Agent;
use crate::models::backup::{Backup, BackupCounts, BackupStatus};
use crate::models::inventory::{Repository, Schedule};
use crate::models::metrics::{DashboardStats, MetricsDailySummary, MetricsHistory};
use crate::models::organization::Organization;
use crate::models::storage::{StorageStats, StorageStatsSummary};
use crate::models::trends::{
    BackupDurationPoint, BackupSuccessRate, DailyBackupStats, StorageGrowthPoint,
};

/// Read/write contract the collector and aggregator need from persistence.
///
/// Every call is one blocking round-trip to the store; implementations must
/// make `create_or_update_daily_summary` idempotent on `(org_id, date)`.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn get_all_organizations(&self) -> Result<Vec<Organization>, AppError>;

    async fn get_agents_by_org_id(&self, org_id: Uuid) -> Result<Vec<Agent>, AppError>;

    async fn get_backups_by_org_id(&self, org_id: Uuid) -> Result<Vec<Backup>, AppError>;
    async fn get_backups_by_org_id_since(
        &self,
        org_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Backup>, AppError>;
    /// Backups whose `started_at` lies in `[start, end]`, both inclusive.
    async fn get_backups_by_org_id_and_date_range(
        &self,
        org_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Backup>, AppError>;
    async fn get_backup_counts_by_org_id(&self, org_id: Uuid) -> Result<BackupCounts, AppError>;
    async fn get_backups_by_status(&self, status: &BackupStatus) -> Result<Vec<Backup>, AppError>;

    async fn get_repositories_by_org_id(&self, org_id: Uuid) -> Result<Vec<Repository>, AppError>;
    async fn get_schedules_by_org_id(&self, org_id: Uuid) -> Result<Vec<Schedule>, AppError>;

    async fn get_storage_stats_summary(
        &self,
        org_id: Uuid,
    ) -> Result<Option<StorageStatsSummary>, AppError>;
    async fn get_latest_stats_for_all_repos(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<StorageStats>, AppError>;

    /// Store-side pre-aggregate; the collector builds its own view instead.
    async fn get_dashboard_stats(&self, org_id: Uuid) -> Result<DashboardStats, AppError>;
    async fn get_backup_success_rates(
        &self,
        org_id: Uuid,
    ) -> Result<(Option<BackupSuccessRate>, Option<BackupSuccessRate>), AppError>;
    async fn get_storage_growth_trend(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<StorageGrowthPoint>, AppError>;
    async fn get_backup_duration_trend(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<BackupDurationPoint>, AppError>;
    async fn get_daily_backup_stats(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<DailyBackupStats>, AppError>;

    async fn create_or_update_daily_summary(
        &self,
        summary: &MetricsDailySummary,
    ) -> Result<(), AppError>;
    async fn get_daily_summaries(
        &self,
        org_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricsDailySummary>, AppError>;

    async fn create_metrics_history(&self, history: &MetricsHistory) -> Result<(), AppError>;
    async fn get_metrics_history(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricsHistory>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Fleet-wide reads used by the Prometheus scrape path.
#[async_trait]
pub trait PrometheusStore: Send + Sync {
    async fn get_all_agents(&self) -> Result<Vec<Agent>, AppError>;
    async fn get_all_backups(&self) -> Result<Vec<Backup>, AppError>;
    async fn get_storage_stats_summary_global(
        &self,
    ) -> Result<Option<StorageStatsSummary>, AppError>;
}
