use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
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
use crate::repository::{MetricsStore, PrometheusStore};
use crate::util::{day_start, from_millis, to_millis};

const MILLIS_PER_DAY: i64 = 86_400_000;

const BACKUP_COLUMNS: &str = "id, org_id, agent_id, schedule_id, repository_id, status, \
     started_at, completed_at, size_bytes, files_new, files_changed, error_message";

const HISTORY_COLUMNS: &str = "id, org_id, backup_count, backup_success_count, backup_failed_count, \
     backup_total_size, backup_total_duration, agent_total_count, agent_online_count, \
     agent_offline_count, storage_used_bytes, storage_raw_bytes, storage_space_saved, \
     repository_count, total_snapshots, created_at";

// Latest row per repository; ties on collected_at are broken by rowid.
const LATEST_STATS_FILTER: &str = "s.rowid = (SELECT s2.rowid FROM storage_stats s2 \
     WHERE s2.repository_id = s.repository_id \
     ORDER BY s2.collected_at DESC, s2.rowid DESC LIMIT 1)";

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    created_at: i64,
}

impl From<OrganizationRow> for Organization {
    fn from(r: OrganizationRow) -> Self {
        Organization {
            id: r.id,
            name: r.name,
            created_at: from_millis(r.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: Uuid,
    org_id: Uuid,
    hostname: String,
    status: String,
    last_seen: Option<i64>,
    created_at: i64,
}

impl From<AgentRow> for Agent {
    fn from(r: AgentRow) -> Self {
        Agent {
            id: r.id,
            org_id: r.org_id,
            hostname: r.hostname,
            status: r.status.into(),
            last_seen: r.last_seen.map(from_millis),
            created_at: from_millis(r.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct BackupRow {
    id: Uuid,
    org_id: Uuid,
    agent_id: Uuid,
    schedule_id: Option<Uuid>,
    repository_id: Option<Uuid>,
    status: String,
    started_at: Option<i64>,
    completed_at: Option<i64>,
    size_bytes: Option<i64>,
    files_new: Option<i64>,
    files_changed: Option<i64>,
    error_message: Option<String>,
}

impl From<BackupRow> for Backup {
    fn from(r: BackupRow) -> Self {
        Backup {
            id: r.id,
            org_id: r.org_id,
            agent_id: r.agent_id,
            schedule_id: r.schedule_id,
            repository_id: r.repository_id,
            status: r.status.into(),
            started_at: r.started_at.map(from_millis),
            completed_at: r.completed_at.map(from_millis),
            size_bytes: r.size_bytes,
            files_new: r.files_new,
            files_changed: r.files_changed,
            error_message: r.error_message,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RepositoryRow {
    id: Uuid,
    org_id: Uuid,
    name: String,
    kind: String,
    created_at: i64,
}

impl From<RepositoryRow> for Repository {
    fn from(r: RepositoryRow) -> Self {
        Repository {
            id: r.id,
            org_id: r.org_id,
            name: r.name,
            kind: r.kind,
            created_at: from_millis(r.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    org_id: Uuid,
    agent_id: Uuid,
    repository_id: Option<Uuid>,
    name: String,
    cron_expression: String,
    enabled: bool,
    created_at: i64,
}

impl From<ScheduleRow> for Schedule {
    fn from(r: ScheduleRow) -> Self {
        Schedule {
            id: r.id,
            org_id: r.org_id,
            agent_id: r.agent_id,
            repository_id: r.repository_id,
            name: r.name,
            cron_expression: r.cron_expression,
            enabled: r.enabled,
            created_at: from_millis(r.created_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StorageStatsRow {
    id: Uuid,
    repository_id: Uuid,
    total_size: i64,
    total_file_count: i64,
    raw_data_size: i64,
    restore_size: i64,
    dedup_ratio: f64,
    space_saved: i64,
    space_saved_pct: f64,
    snapshot_count: i64,
    collected_at: i64,
}

impl From<StorageStatsRow> for StorageStats {
    fn from(r: StorageStatsRow) -> Self {
        StorageStats {
            id: r.id,
            repository_id: r.repository_id,
            total_size: r.total_size,
            total_file_count: r.total_file_count,
            raw_data_size: r.raw_data_size,
            restore_size: r.restore_size,
            dedup_ratio: r.dedup_ratio,
            space_saved: r.space_saved,
            space_saved_pct: r.space_saved_pct,
            snapshot_count: r.snapshot_count,
            collected_at: from_millis(r.collected_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    org_id: Uuid,
    date: i64,
    total_backups: i64,
    successful_backups: i64,
    failed_backups: i64,
    total_size_bytes: i64,
    total_duration_secs: i64,
    agents_active: i64,
    created_at: i64,
    updated_at: i64,
}

impl From<SummaryRow> for MetricsDailySummary {
    fn from(r: SummaryRow) -> Self {
        MetricsDailySummary {
            id: r.id,
            org_id: r.org_id,
            date: from_millis(r.date),
            total_backups: r.total_backups,
            successful_backups: r.successful_backups,
            failed_backups: r.failed_backups,
            total_size_bytes: r.total_size_bytes,
            total_duration_secs: r.total_duration_secs,
            agents_active: r.agents_active,
            created_at: from_millis(r.created_at),
            updated_at: from_millis(r.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    org_id: Uuid,
    backup_count: i64,
    backup_success_count: i64,
    backup_failed_count: i64,
    backup_total_size: i64,
    backup_total_duration: i64,
    agent_total_count: i64,
    agent_online_count: i64,
    agent_offline_count: i64,
    storage_used_bytes: i64,
    storage_raw_bytes: i64,
    storage_space_saved: i64,
    repository_count: i64,
    total_snapshots: i64,
    created_at: i64,
}

impl From<HistoryRow> for MetricsHistory {
    fn from(r: HistoryRow) -> Self {
        MetricsHistory {
            id: r.id,
            org_id: r.org_id,
            backup_count: r.backup_count,
            backup_success_count: r.backup_success_count,
            backup_failed_count: r.backup_failed_count,
            backup_total_size: r.backup_total_size,
            backup_total_duration: r.backup_total_duration,
            agent_total_count: r.agent_total_count,
            agent_online_count: r.agent_online_count,
            agent_offline_count: r.agent_offline_count,
            storage_used_bytes: r.storage_used_bytes,
            storage_raw_bytes: r.storage_raw_bytes,
            storage_space_saved: r.storage_space_saved,
            repository_count: r.repository_count,
            total_snapshots: r.total_snapshots,
            created_at: from_millis(r.created_at),
        }
    }
}

/// (raw, restore, saved, avg dedup, repositories, snapshots)
type SummaryTuple = (i64, i64, i64, f64, i64, i64);

fn summary_from_tuple(row: SummaryTuple) -> Option<StorageStatsSummary> {
    let (
        total_raw_size,
        total_restore_size,
        total_space_saved,
        avg_dedup_ratio,
        repository_count,
        total_snapshots,
    ) = row;
    if repository_count == 0 {
        return None;
    }
    Some(StorageStatsSummary {
        total_raw_size,
        total_restore_size,
        total_space_saved,
        avg_dedup_ratio,
        repository_count,
        total_snapshots,
    })
}

fn epoch_day(day: i64) -> NaiveDate {
    from_millis(day * MILLIS_PER_DAY).date_naive()
}

/// Start of the oldest day included in a `days`-long trend ending today.
///
/// Spans reaching past chrono's first instant cover all stored history.
fn trend_start(days: i64) -> DateTime<Utc> {
    Duration::try_days(days.max(1) - 1)
        .and_then(|span| day_start(Utc::now()).checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_organization(&self, org: &Organization) -> Result<(), AppError> {
        tracing::debug!(org_id = %org.id, "db: INSERT organizations");
        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?, ?, ?)")
            .bind(org.id)
            .bind(&org.name)
            .bind(to_millis(org.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_agent(&self, agent: &Agent) -> Result<(), AppError> {
        tracing::debug!(agent_id = %agent.id, org_id = %agent.org_id, "db: INSERT agents");
        sqlx::query(
            "INSERT INTO agents (id, org_id, hostname, status, last_seen, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(agent.id)
        .bind(agent.org_id)
        .bind(&agent.hostname)
        .bind(agent.status.as_str())
        .bind(agent.last_seen.map(to_millis))
        .bind(to_millis(agent.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_backup(&self, backup: &Backup) -> Result<(), AppError> {
        tracing::debug!(backup_id = %backup.id, org_id = %backup.org_id, "db: INSERT backups");
        sqlx::query(&format!(
            "INSERT INTO backups ({BACKUP_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(backup.id)
        .bind(backup.org_id)
        .bind(backup.agent_id)
        .bind(backup.schedule_id)
        .bind(backup.repository_id)
        .bind(backup.status.as_str())
        .bind(backup.started_at.map(to_millis))
        .bind(backup.completed_at.map(to_millis))
        .bind(backup.size_bytes)
        .bind(backup.files_new)
        .bind(backup.files_changed)
        .bind(&backup.error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_repository(&self, repo: &Repository) -> Result<(), AppError> {
        tracing::debug!(repository_id = %repo.id, org_id = %repo.org_id, "db: INSERT repositories");
        sqlx::query(
            "INSERT INTO repositories (id, org_id, name, kind, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(repo.id)
        .bind(repo.org_id)
        .bind(&repo.name)
        .bind(&repo.kind)
        .bind(to_millis(repo.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_schedule(&self, schedule: &Schedule) -> Result<(), AppError> {
        tracing::debug!(schedule_id = %schedule.id, org_id = %schedule.org_id, "db: INSERT schedules");
        sqlx::query(
            "INSERT INTO schedules (id, org_id, agent_id, repository_id, name, cron_expression, enabled, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(schedule.id)
        .bind(schedule.org_id)
        .bind(schedule.agent_id)
        .bind(schedule.repository_id)
        .bind(&schedule.name)
        .bind(&schedule.cron_expression)
        .bind(schedule.enabled)
        .bind(to_millis(schedule.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_storage_stats(&self, stats: &StorageStats) -> Result<(), AppError> {
        tracing::debug!(repository_id = %stats.repository_id, "db: INSERT storage_stats");
        sqlx::query(
            "INSERT INTO storage_stats (id, repository_id, total_size, total_file_count, raw_data_size, \
             restore_size, dedup_ratio, space_saved, space_saved_pct, snapshot_count, collected_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(stats.id)
        .bind(stats.repository_id)
        .bind(stats.total_size)
        .bind(stats.total_file_count)
        .bind(stats.raw_data_size)
        .bind(stats.restore_size)
        .bind(stats.dedup_ratio)
        .bind(stats.space_saved)
        .bind(stats.space_saved_pct)
        .bind(stats.snapshot_count)
        .bind(to_millis(stats.collected_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn success_rate(
        &self,
        org_id: Uuid,
        period: &str,
        days: i64,
    ) -> Result<Option<BackupSuccessRate>, AppError> {
        let since = to_millis(Utc::now() - Duration::days(days));

        let (total, successful, failed): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
               COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) \
             FROM backups WHERE org_id = ? AND started_at >= ? AND status != 'running'",
        )
        .bind(org_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(org_id = %org_id, period, total, successful, "db: success rate computed");

        if total == 0 {
            return Ok(None);
        }

        Ok(Some(BackupSuccessRate {
            period: period.to_string(),
            total,
            successful,
            failed,
            success_percent: successful as f64 * 100.0 / total as f64,
        }))
    }
}

#[async_trait]
impl MetricsStore for SqliteRepository {
    async fn get_all_organizations(&self) -> Result<Vec<Organization>, AppError> {
        tracing::debug!("db: SELECT all organizations");

        let rows: Vec<OrganizationRow> =
            sqlx::query_as("SELECT id, name, created_at FROM organizations ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?;

        tracing::debug!(rows_returned = rows.len(), "db: organizations fetched");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_agents_by_org_id(&self, org_id: Uuid) -> Result<Vec<Agent>, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT agents by org");

        let rows: Vec<AgentRow> = sqlx::query_as(
            "SELECT id, org_id, hostname, status, last_seen, created_at FROM agents WHERE org_id = ?",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(org_id = %org_id, rows_returned = rows.len(), "db: agents fetched");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_backups_by_org_id(&self, org_id: Uuid) -> Result<Vec<Backup>, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT backups by org");

        let rows: Vec<BackupRow> = sqlx::query_as(&format!(
            "SELECT {BACKUP_COLUMNS} FROM backups WHERE org_id = ? ORDER BY started_at DESC"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(org_id = %org_id, rows_returned = rows.len(), "db: backups fetched");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_backups_by_org_id_since(
        &self,
        org_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Backup>, AppError> {
        tracing::debug!(org_id = %org_id, since = %since, "db: SELECT backups WHERE started_at >= since");

        let rows: Vec<BackupRow> = sqlx::query_as(&format!(
            "SELECT {BACKUP_COLUMNS} FROM backups WHERE org_id = ? AND started_at >= ? \
             ORDER BY started_at DESC"
        ))
        .bind(org_id)
        .bind(to_millis(since))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_backups_by_org_id_and_date_range(
        &self,
        org_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Backup>, AppError> {
        tracing::debug!(
            org_id = %org_id,
            start = %start,
            end = %end,
            "db: SELECT backups WHERE started_at BETWEEN start AND end"
        );

        let rows: Vec<BackupRow> = sqlx::query_as(&format!(
            "SELECT {BACKUP_COLUMNS} FROM backups \
             WHERE org_id = ? AND started_at >= ? AND started_at <= ? ORDER BY started_at ASC"
        ))
        .bind(org_id)
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(org_id = %org_id, rows_returned = rows.len(), "db: backups in range fetched");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_backup_counts_by_org_id(&self, org_id: Uuid) -> Result<BackupCounts, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT backup counts");

        let since = to_millis(Utc::now() - Duration::hours(24));
        let (total, running, failed_24h): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
               COALESCE(SUM(CASE WHEN status = 'running' THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN status = 'failed' AND started_at >= ? THEN 1 ELSE 0 END), 0) \
             FROM backups WHERE org_id = ?",
        )
        .bind(since)
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(BackupCounts {
            total,
            running,
            failed_24h,
        })
    }

    async fn get_backups_by_status(&self, status: &BackupStatus) -> Result<Vec<Backup>, AppError> {
        tracing::debug!(status = status.as_str(), "db: SELECT backups by status");

        let rows: Vec<BackupRow> = sqlx::query_as(&format!(
            "SELECT {BACKUP_COLUMNS} FROM backups WHERE status = ? ORDER BY started_at DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_repositories_by_org_id(&self, org_id: Uuid) -> Result<Vec<Repository>, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT repositories by org");

        let rows: Vec<RepositoryRow> = sqlx::query_as(
            "SELECT id, org_id, name, kind, created_at FROM repositories WHERE org_id = ? ORDER BY name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_schedules_by_org_id(&self, org_id: Uuid) -> Result<Vec<Schedule>, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT schedules by org");

        let rows: Vec<ScheduleRow> = sqlx::query_as(
            "SELECT id, org_id, agent_id, repository_id, name, cron_expression, enabled, created_at \
             FROM schedules WHERE org_id = ? ORDER BY name",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_storage_stats_summary(
        &self,
        org_id: Uuid,
    ) -> Result<Option<StorageStatsSummary>, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT storage stats summary");

        let row: SummaryTuple = sqlx::query_as(&format!(
            "SELECT COALESCE(SUM(s.raw_data_size), 0), COALESCE(SUM(s.restore_size), 0), \
               COALESCE(SUM(s.space_saved), 0), COALESCE(AVG(s.dedup_ratio), 0.0), \
               COUNT(*), COALESCE(SUM(s.snapshot_count), 0) \
             FROM storage_stats s JOIN repositories r ON r.id = s.repository_id \
             WHERE r.org_id = ? AND {LATEST_STATS_FILTER}"
        ))
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary_from_tuple(row))
    }

    async fn get_latest_stats_for_all_repos(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<StorageStats>, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT latest storage stats per repository");

        let rows: Vec<StorageStatsRow> = sqlx::query_as(&format!(
            "SELECT s.id, s.repository_id, s.total_size, s.total_file_count, s.raw_data_size, \
               s.restore_size, s.dedup_ratio, s.space_saved, s.space_saved_pct, s.snapshot_count, \
               s.collected_at \
             FROM storage_stats s JOIN repositories r ON r.id = s.repository_id \
             WHERE r.org_id = ? AND {LATEST_STATS_FILTER} ORDER BY r.name"
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_dashboard_stats(&self, org_id: Uuid) -> Result<DashboardStats, AppError> {
        tracing::debug!(org_id = %org_id, "db: SELECT dashboard pre-aggregate");

        let (agent_total, agent_online, agent_offline): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
               COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN status = 'offline' THEN 1 ELSE 0 END), 0) \
             FROM agents WHERE org_id = ?",
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        let (repository_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM repositories WHERE org_id = ?")
                .bind(org_id)
                .fetch_one(&self.pool)
                .await?;

        let (schedule_count, schedule_enabled): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN enabled THEN 1 ELSE 0 END), 0) \
             FROM schedules WHERE org_id = ?",
        )
        .bind(org_id)
        .fetch_one(&self.pool)
        .await?;

        let counts = self.get_backup_counts_by_org_id(org_id).await?;
        let storage = self
            .get_storage_stats_summary(org_id)
            .await?
            .unwrap_or_default();
        let (rate_7d, rate_30d) = self.get_backup_success_rates(org_id).await?;

        Ok(DashboardStats {
            agent_total,
            agent_online,
            agent_offline,
            backup_total: counts.total,
            backup_running: counts.running,
            backup_failed_24h: counts.failed_24h,
            repository_count,
            schedule_count,
            schedule_enabled,
            total_raw_size: storage.total_raw_size,
            total_backup_size: storage.total_restore_size,
            total_space_saved: storage.total_space_saved,
            avg_dedup_ratio: storage.avg_dedup_ratio,
            success_rate_7d: rate_7d.map(|r| r.success_percent).unwrap_or_default(),
            success_rate_30d: rate_30d.map(|r| r.success_percent).unwrap_or_default(),
        })
    }

    async fn get_backup_success_rates(
        &self,
        org_id: Uuid,
    ) -> Result<(Option<BackupSuccessRate>, Option<BackupSuccessRate>), AppError> {
        let rate_7d = self.success_rate(org_id, "7d", 7).await?;
        let rate_30d = self.success_rate(org_id, "30d", 30).await?;
        Ok((rate_7d, rate_30d))
    }

    async fn get_storage_growth_trend(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<StorageGrowthPoint>, AppError> {
        tracing::debug!(org_id = %org_id, days, "db: SELECT storage growth trend");

        // Last measurement of each repository on each day, summed per day.
        let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT s.collected_at / 86400000 AS day, SUM(s.raw_data_size), SUM(s.restore_size), \
               SUM(s.snapshot_count) \
             FROM storage_stats s JOIN repositories r ON r.id = s.repository_id \
             WHERE r.org_id = ? AND s.collected_at >= ? \
               AND s.rowid = (SELECT s2.rowid FROM storage_stats s2 \
                 WHERE s2.repository_id = s.repository_id \
                   AND s2.collected_at / 86400000 = s.collected_at / 86400000 \
                 ORDER BY s2.collected_at DESC, s2.rowid DESC LIMIT 1) \
             GROUP BY day ORDER BY day ASC",
        )
        .bind(org_id)
        .bind(to_millis(trend_start(days)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, raw_data_size, restore_size, snapshot_count)| StorageGrowthPoint {
                date: epoch_day(day),
                raw_data_size,
                restore_size,
                snapshot_count,
            })
            .collect())
    }

    async fn get_backup_duration_trend(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<BackupDurationPoint>, AppError> {
        tracing::debug!(org_id = %org_id, days, "db: SELECT backup duration trend");

        let rows: Vec<(i64, f64, i64, i64, i64)> = sqlx::query_as(
            "SELECT started_at / 86400000 AS day, AVG(completed_at - started_at), \
               MAX(completed_at - started_at), MIN(completed_at - started_at), COUNT(*) \
             FROM backups \
             WHERE org_id = ? AND status = 'completed' AND started_at >= ? AND completed_at IS NOT NULL \
             GROUP BY day ORDER BY day ASC",
        )
        .bind(org_id)
        .bind(to_millis(trend_start(days)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(day, avg_duration_ms, max_duration_ms, min_duration_ms, backup_count)| {
                    BackupDurationPoint {
                        date: epoch_day(day),
                        avg_duration_ms,
                        max_duration_ms,
                        min_duration_ms,
                        backup_count,
                    }
                },
            )
            .collect())
    }

    async fn get_daily_backup_stats(
        &self,
        org_id: Uuid,
        days: i64,
    ) -> Result<Vec<DailyBackupStats>, AppError> {
        tracing::debug!(org_id = %org_id, days, "db: SELECT daily backup stats");

        let rows: Vec<(i64, i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT started_at / 86400000 AS day, COUNT(*), \
               COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0), \
               COALESCE(SUM(CASE WHEN status = 'completed' THEN COALESCE(size_bytes, 0) ELSE 0 END), 0) \
             FROM backups WHERE org_id = ? AND started_at >= ? \
             GROUP BY day ORDER BY day ASC",
        )
        .bind(org_id)
        .bind(to_millis(trend_start(days)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(day, total, successful, failed, total_size)| DailyBackupStats {
                date: epoch_day(day),
                total,
                successful,
                failed,
                total_size,
            })
            .collect())
    }

    async fn create_or_update_daily_summary(
        &self,
        summary: &MetricsDailySummary,
    ) -> Result<(), AppError> {
        tracing::debug!(
            org_id = %summary.org_id,
            date = %summary.date.date_naive(),
            "db: UPSERT metrics_daily_summaries ON CONFLICT (org_id, date)"
        );

        // The row keeps its original id and created_at on conflict.
        sqlx::query(
            "INSERT INTO metrics_daily_summaries (id, org_id, date, total_backups, successful_backups, \
               failed_backups, total_size_bytes, total_duration_secs, agents_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (org_id, date) DO UPDATE SET \
               total_backups = excluded.total_backups, \
               successful_backups = excluded.successful_backups, \
               failed_backups = excluded.failed_backups, \
               total_size_bytes = excluded.total_size_bytes, \
               total_duration_secs = excluded.total_duration_secs, \
               agents_active = excluded.agents_active, \
               updated_at = excluded.updated_at",
        )
        .bind(summary.id)
        .bind(summary.org_id)
        .bind(to_millis(summary.date))
        .bind(summary.total_backups)
        .bind(summary.successful_backups)
        .bind(summary.failed_backups)
        .bind(summary.total_size_bytes)
        .bind(summary.total_duration_secs)
        .bind(summary.agents_active)
        .bind(to_millis(summary.created_at))
        .bind(to_millis(summary.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_daily_summaries(
        &self,
        org_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricsDailySummary>, AppError> {
        tracing::debug!(org_id = %org_id, from = %from, to = %to, "db: SELECT daily summaries");

        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT id, org_id, date, total_backups, successful_backups, failed_backups, \
               total_size_bytes, total_duration_secs, agents_active, created_at, updated_at \
             FROM metrics_daily_summaries WHERE org_id = ? AND date >= ? AND date <= ? \
             ORDER BY date ASC",
        )
        .bind(org_id)
        .bind(to_millis(from))
        .bind(to_millis(to))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_metrics_history(&self, history: &MetricsHistory) -> Result<(), AppError> {
        tracing::debug!(org_id = %history.org_id, "db: INSERT metrics_history");

        sqlx::query(&format!(
            "INSERT INTO metrics_history ({HISTORY_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(history.id)
        .bind(history.org_id)
        .bind(history.backup_count)
        .bind(history.backup_success_count)
        .bind(history.backup_failed_count)
        .bind(history.backup_total_size)
        .bind(history.backup_total_duration)
        .bind(history.agent_total_count)
        .bind(history.agent_online_count)
        .bind(history.agent_offline_count)
        .bind(history.storage_used_bytes)
        .bind(history.storage_raw_bytes)
        .bind(history.storage_space_saved)
        .bind(history.repository_count)
        .bind(history.total_snapshots)
        .bind(to_millis(history.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_metrics_history(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricsHistory>, AppError> {
        tracing::debug!(org_id = %org_id, limit, "db: SELECT metrics_history");

        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT {HISTORY_COLUMNS} FROM metrics_history WHERE org_id = ? \
             ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(org_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl PrometheusStore for SqliteRepository {
    async fn get_all_agents(&self) -> Result<Vec<Agent>, AppError> {
        tracing::debug!("db: SELECT all agents");

        let rows: Vec<AgentRow> = sqlx::query_as(
            "SELECT id, org_id, hostname, status, last_seen, created_at FROM agents",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_all_backups(&self) -> Result<Vec<Backup>, AppError> {
        tracing::debug!("db: SELECT all backups");

        let rows: Vec<BackupRow> = sqlx::query_as(&format!("SELECT {BACKUP_COLUMNS} FROM backups"))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_storage_stats_summary_global(
        &self,
    ) -> Result<Option<StorageStatsSummary>, AppError> {
        tracing::debug!("db: SELECT global storage stats summary");

        let row: SummaryTuple = sqlx::query_as(&format!(
            "SELECT COALESCE(SUM(s.raw_data_size), 0), COALESCE(SUM(s.restore_size), 0), \
               COALESCE(SUM(s.space_saved), 0), COALESCE(AVG(s.dedup_ratio), 0.0), \
               COUNT(*), COALESCE(SUM(s.snapshot_count), 0) \
             FROM storage_stats s WHERE {LATEST_STATS_FILTER}"
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(summary_from_tuple(row))
    }
}
