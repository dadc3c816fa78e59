use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, ResultExt};
use crate::metrics::fold::{tally_agents, tally_backups};
use crate::metrics::soft::soft_fetch;
use crate::models::metrics::{DashboardStats, MetricsHistory};
use crate::models::storage::{StorageStats, StorageStatsSummary};
use crate::models::trends::{
    BackupDurationPoint, BackupSuccessRate, DailyBackupStats, StorageGrowthPoint,
};
use crate::repository::MetricsStore;

/// Builds live, per-organization metric views straight from the store.
///
/// Agents, backups, repositories and schedules are hard dependencies: a failed
/// fetch aborts the call. Storage summaries and success rates are best-effort
/// and fall back to zero.
#[derive(Clone)]
pub struct Collector {
    store: Arc<dyn MetricsStore>,
}

impl Collector {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Snapshot of one organization. Nothing is persisted here.
    pub async fn collect_metrics(&self, org_id: Uuid) -> Result<MetricsHistory, AppError> {
        tracing::debug!(org_id = %org_id, "collector: collecting metrics snapshot");

        let mut history = MetricsHistory::new(org_id);

        let agents = self
            .store
            .get_agents_by_org_id(org_id)
            .await
            .context("get agents")?;
        let backups = self
            .store
            .get_backups_by_org_id(org_id)
            .await
            .context("get backups")?;
        let repos = self
            .store
            .get_repositories_by_org_id(org_id)
            .await
            .context("get repositories")?;

        let agent_tally = tally_agents(&agents);
        history.agent_total_count = agent_tally.total;
        history.agent_online_count = agent_tally.online;
        history.agent_offline_count = agent_tally.offline;

        let backup_tally = tally_backups(&backups);
        history.backup_count = backup_tally.total;
        history.backup_success_count = backup_tally.successful;
        history.backup_failed_count = backup_tally.failed;
        history.backup_total_size = backup_tally.completed_size_bytes;
        history.backup_total_duration = backup_tally.duration_millis;

        history.repository_count = repos.len() as i64;

        let storage: StorageStatsSummary = soft_fetch(
            self.store.get_storage_stats_summary(org_id).await,
            "storage stats summary",
            Some(org_id),
        )
        .unwrap_or_default();
        history.storage_used_bytes = storage.total_raw_size;
        history.storage_raw_bytes = storage.total_restore_size;
        history.storage_space_saved = storage.total_space_saved;
        history.total_snapshots = storage.total_snapshots;

        tracing::debug!(
            org_id = %org_id,
            agents = history.agent_total_count,
            backups = history.backup_count,
            repositories = history.repository_count,
            "collector: snapshot collected"
        );

        Ok(history)
    }

    pub async fn get_dashboard_stats(&self, org_id: Uuid) -> Result<DashboardStats, AppError> {
        tracing::debug!(org_id = %org_id, "collector: building dashboard stats");

        let mut stats = DashboardStats::default();

        let agents = self
            .store
            .get_agents_by_org_id(org_id)
            .await
            .context("get agents")?;
        let agent_tally = tally_agents(&agents);
        stats.agent_total = agent_tally.total;
        stats.agent_online = agent_tally.online;
        stats.agent_offline = agent_tally.offline;

        let counts = self
            .store
            .get_backup_counts_by_org_id(org_id)
            .await
            .context("get backup counts")?;
        stats.backup_total = counts.total;
        stats.backup_running = counts.running;
        stats.backup_failed_24h = counts.failed_24h;

        let repos = self
            .store
            .get_repositories_by_org_id(org_id)
            .await
            .context("get repositories")?;
        stats.repository_count = repos.len() as i64;

        let schedules = self
            .store
            .get_schedules_by_org_id(org_id)
            .await
            .context("get schedules")?;
        stats.schedule_count = schedules.len() as i64;
        stats.schedule_enabled = schedules.iter().filter(|s| s.enabled).count() as i64;

        let storage: StorageStatsSummary = soft_fetch(
            self.store.get_storage_stats_summary(org_id).await,
            "storage stats summary",
            Some(org_id),
        )
        .unwrap_or_default();
        stats.total_raw_size = storage.total_raw_size;
        stats.total_backup_size = storage.total_restore_size;
        stats.total_space_saved = storage.total_space_saved;
        stats.avg_dedup_ratio = storage.avg_dedup_ratio;

        let (rate_7d, rate_30d) = soft_fetch(
            self.store.get_backup_success_rates(org_id).await.map(Some),
            "backup success rates",
            Some(org_id),
        )
        .unwrap_or_default();
        stats.success_rate_7d = rate_7d.map(|r| r.success_percent).unwrap_or_default();
        stats.success_rate_30d = rate_30d.map(|r| r.success_percent).unwrap_or_default();

        Ok(stats)
    }

    pub async fn get_backup_success_rates(
        &self,
        org_id: Uuid,
    ) -> Result<(Option<BackupSuccessRate>, Option<BackupSuccessRate>), AppError> {
        self.store.get_backup_success_rates(org_id).await
    }

    pub async fn get_storage_growth_trend(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<StorageGrowthPoint>, AppError> {
        self.store.get_storage_growth_trend(org_id, days).await
    }

    pub async fn get_backup_duration_trend(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<BackupDurationPoint>, AppError> {
        self.store.get_backup_duration_trend(org_id, days).await
    }

    pub async fn get_daily_backup_stats(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<DailyBackupStats>, AppError> {
        self.store.get_daily_backup_stats(org_id, days).await
    }

    /// Latest storage measurement of each repository in the organization.
    pub async fn get_repository_storage(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<StorageStats>, AppError> {
        self.store.get_latest_stats_for_all_repos(org_id).await
    }

    pub async fn get_metrics_history(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricsHistory>, AppError> {
        self.store.get_metrics_history(org_id, limit).await
    }
}
