//! In-memory store with call counting and per-method failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::agent::{Agent, AgentStatus};
use crate::models::backup::{Backup, BackupCounts, BackupStatus};
use crate::models::inventory::{Repository, Schedule};
use crate::models::metrics::{DashboardStats, MetricsDailySummary, MetricsHistory};
use crate::models::organization::Organization;
use crate::models::storage::{StorageStats, StorageStatsSummary};
use crate::models::trends::{
    BackupDurationPoint, BackupSuccessRate, DailyBackupStats, StorageGrowthPoint,
};
use crate::repository::{MetricsStore, PrometheusStore};

pub fn agent(org_id: Uuid, status: AgentStatus) -> Agent {
    Agent {
        id: Uuid::new_v4(),
        org_id,
        hostname: "host".into(),
        status,
        last_seen: None,
        created_at: Utc::now(),
    }
}

/// A backup started at `started_at`; `duration_secs` sets the completion time.
pub fn backup(
    org_id: Uuid,
    agent_id: Uuid,
    status: &str,
    started_at: DateTime<Utc>,
    duration_secs: Option<i64>,
    size_bytes: Option<i64>,
) -> Backup {
    Backup {
        id: Uuid::new_v4(),
        org_id,
        agent_id,
        schedule_id: None,
        repository_id: None,
        status: BackupStatus::from(status),
        started_at: Some(started_at),
        completed_at: duration_secs.map(|s| started_at + Duration::seconds(s)),
        size_bytes,
        files_new: None,
        files_changed: None,
        error_message: None,
    }
}

#[derive(Default)]
struct State {
    orgs: Vec<Organization>,
    agents: Vec<Agent>,
    backups: Vec<Backup>,
    repositories: Vec<Repository>,
    schedules: Vec<Schedule>,
    storage_summaries: HashMap<Uuid, StorageStatsSummary>,
    global_storage_summary: Option<StorageStatsSummary>,
    backup_counts: HashMap<Uuid, BackupCounts>,
    success_rates: HashMap<Uuid, (Option<BackupSuccessRate>, Option<BackupSuccessRate>)>,
    daily_summaries: Vec<MetricsDailySummary>,
    history: Vec<MetricsHistory>,
    calls: HashMap<&'static str, usize>,
    failing: HashSet<&'static str>,
    failing_for_org: HashSet<(&'static str, Uuid)>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn hit(&self, method: &'static str, org_id: Option<Uuid>) -> Result<(), AppError> {
        let mut state = self.state();
        *state.calls.entry(method).or_insert(0) += 1;
        let failing = state.failing.contains(method)
            || org_id.is_some_and(|org| state.failing_for_org.contains(&(method, org)));
        if failing {
            return Err(AppError::NotFound(format!("injected failure: {method}")));
        }
        Ok(())
    }

    pub fn fail(&self, method: &'static str) {
        self.state().failing.insert(method);
    }

    pub fn fail_for_org(&self, method: &'static str, org_id: Uuid) {
        self.state().failing_for_org.insert((method, org_id));
    }

    pub fn calls(&self, method: &'static str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    pub fn add_org(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state().orgs.push(Organization {
            id,
            name: name.into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_agent(&self, agent: Agent) {
        self.state().agents.push(agent);
    }

    pub fn add_backup(&self, backup: Backup) {
        self.state().backups.push(backup);
    }

    pub fn add_repository(&self, org_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.state().repositories.push(Repository {
            id,
            org_id,
            name: "repo".into(),
            kind: "local".into(),
            created_at: Utc::now(),
        });
        id
    }

    pub fn add_schedule(&self, org_id: Uuid, enabled: bool) {
        self.state().schedules.push(Schedule {
            id: Uuid::new_v4(),
            org_id,
            agent_id: Uuid::new_v4(),
            repository_id: None,
            name: "nightly".into(),
            cron_expression: "0 2 * * *".into(),
            enabled,
            created_at: Utc::now(),
        });
    }

    pub fn set_storage_summary(&self, org_id: Uuid, summary: StorageStatsSummary) {
        self.state().storage_summaries.insert(org_id, summary);
    }

    pub fn set_global_storage_summary(&self, summary: StorageStatsSummary) {
        self.state().global_storage_summary = Some(summary);
    }

    pub fn set_backup_counts(&self, org_id: Uuid, counts: BackupCounts) {
        self.state().backup_counts.insert(org_id, counts);
    }

    pub fn set_success_rates(
        &self,
        org_id: Uuid,
        rate_7d: Option<BackupSuccessRate>,
        rate_30d: Option<BackupSuccessRate>,
    ) {
        self.state().success_rates.insert(org_id, (rate_7d, rate_30d));
    }

    pub fn daily_summaries(&self) -> Vec<MetricsDailySummary> {
        self.state().daily_summaries.clone()
    }

    fn backups_where(&self, keep: impl Fn(&Backup) -> bool) -> Vec<Backup> {
        self.state().backups.iter().filter(|&b| keep(b)).cloned().collect()
    }
}

#[async_trait]
impl MetricsStore for FakeStore {
    async fn get_all_organizations(&self) -> Result<Vec<Organization>, AppError> {
        self.hit("get_all_organizations", None)?;
        Ok(self.state().orgs.clone())
    }

    async fn get_agents_by_org_id(&self, org_id: Uuid) -> Result<Vec<Agent>, AppError> {
        self.hit("get_agents_by_org_id", Some(org_id))?;
        let state = self.state();
        Ok(state.agents.iter().filter(|a| a.org_id == org_id).cloned().collect())
    }

    async fn get_backups_by_org_id(&self, org_id: Uuid) -> Result<Vec<Backup>, AppError> {
        self.hit("get_backups_by_org_id", Some(org_id))?;
        Ok(self.backups_where(|b| b.org_id == org_id))
    }

    async fn get_backups_by_org_id_since(
        &self,
        org_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<Backup>, AppError> {
        self.hit("get_backups_by_org_id_since", Some(org_id))?;
        Ok(self.backups_where(|b| b.org_id == org_id && b.started_at.is_some_and(|t| t >= since)))
    }

    async fn get_backups_by_org_id_and_date_range(
        &self,
        org_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Backup>, AppError> {
        self.hit("get_backups_by_org_id_and_date_range", Some(org_id))?;
        Ok(self.backups_where(|b| {
            b.org_id == org_id && b.started_at.is_some_and(|t| t >= start && t <= end)
        }))
    }

    async fn get_backup_counts_by_org_id(&self, org_id: Uuid) -> Result<BackupCounts, AppError> {
        self.hit("get_backup_counts_by_org_id", Some(org_id))?;
        Ok(self
            .state()
            .backup_counts
            .get(&org_id)
            .copied()
            .unwrap_or_default())
    }

    async fn get_backups_by_status(&self, status: &BackupStatus) -> Result<Vec<Backup>, AppError> {
        self.hit("get_backups_by_status", None)?;
        Ok(self.backups_where(|b| &b.status == status))
    }

    async fn get_repositories_by_org_id(&self, org_id: Uuid) -> Result<Vec<Repository>, AppError> {
        self.hit("get_repositories_by_org_id", Some(org_id))?;
        let state = self.state();
        Ok(state
            .repositories
            .iter()
            .filter(|r| r.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn get_schedules_by_org_id(&self, org_id: Uuid) -> Result<Vec<Schedule>, AppError> {
        self.hit("get_schedules_by_org_id", Some(org_id))?;
        let state = self.state();
        Ok(state
            .schedules
            .iter()
            .filter(|s| s.org_id == org_id)
            .cloned()
            .collect())
    }

    async fn get_storage_stats_summary(
        &self,
        org_id: Uuid,
    ) -> Result<Option<StorageStatsSummary>, AppError> {
        self.hit("get_storage_stats_summary", Some(org_id))?;
        Ok(self.state().storage_summaries.get(&org_id).cloned())
    }

    async fn get_latest_stats_for_all_repos(
        &self,
        org_id: Uuid,
    ) -> Result<Vec<StorageStats>, AppError> {
        self.hit("get_latest_stats_for_all_repos", Some(org_id))?;
        Ok(Vec::new())
    }

    async fn get_dashboard_stats(&self, org_id: Uuid) -> Result<DashboardStats, AppError> {
        self.hit("get_dashboard_stats", Some(org_id))?;
        Ok(DashboardStats::default())
    }

    async fn get_backup_success_rates(
        &self,
        org_id: Uuid,
    ) -> Result<(Option<BackupSuccessRate>, Option<BackupSuccessRate>), AppError> {
        self.hit("get_backup_success_rates", Some(org_id))?;
        Ok(self
            .state()
            .success_rates
            .get(&org_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_storage_growth_trend(
        &self,
        org_id: Uuid,
        _days: i64,
    ) -> Result<Vec<StorageGrowthPoint>, AppError> {
        self.hit("get_storage_growth_trend", Some(org_id))?;
        Ok(Vec::new())
    }

    async fn get_backup_duration_trend(
        &self,
        org_id: Uuid,
        _days: i64,
    ) -> Result<Vec<BackupDurationPoint>, AppError> {
        self.hit("get_backup_duration_trend", Some(org_id))?;
        Ok(Vec::new())
    }

    async fn get_daily_backup_stats(
        &self,
        org_id: Uuid,
        _days: i64,
    ) -> Result<Vec<DailyBackupStats>, AppError> {
        self.hit("get_daily_backup_stats", Some(org_id))?;
        Ok(Vec::new())
    }

    async fn create_or_update_daily_summary(
        &self,
        summary: &MetricsDailySummary,
    ) -> Result<(), AppError> {
        self.hit("create_or_update_daily_summary", Some(summary.org_id))?;
        let mut state = self.state();
        state
            .daily_summaries
            .retain(|s| !(s.org_id == summary.org_id && s.date == summary.date));
        state.daily_summaries.push(summary.clone());
        Ok(())
    }

    async fn get_daily_summaries(
        &self,
        org_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MetricsDailySummary>, AppError> {
        self.hit("get_daily_summaries", Some(org_id))?;
        let state = self.state();
        Ok(state
            .daily_summaries
            .iter()
            .filter(|s| s.org_id == org_id && s.date >= from && s.date <= to)
            .cloned()
            .collect())
    }

    async fn create_metrics_history(&self, history: &MetricsHistory) -> Result<(), AppError> {
        self.hit("create_metrics_history", Some(history.org_id))?;
        self.state().history.push(history.clone());
        Ok(())
    }

    async fn get_metrics_history(
        &self,
        org_id: Uuid,
        limit: i64,
    ) -> Result<Vec<MetricsHistory>, AppError> {
        self.hit("get_metrics_history", Some(org_id))?;
        let state = self.state();
        Ok(state
            .history
            .iter()
            .rev()
            .filter(|h| h.org_id == org_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.hit("health_check", None)
    }
}

#[async_trait]
impl PrometheusStore for FakeStore {
    async fn get_all_agents(&self) -> Result<Vec<Agent>, AppError> {
        self.hit("get_all_agents", None)?;
        Ok(self.state().agents.clone())
    }

    async fn get_all_backups(&self) -> Result<Vec<Backup>, AppError> {
        self.hit("get_all_backups", None)?;
        Ok(self.state().backups.clone())
    }

    async fn get_storage_stats_summary_global(
        &self,
    ) -> Result<Option<StorageStatsSummary>, AppError> {
        self.hit("get_storage_stats_summary_global", None)?;
        Ok(self.state().global_storage_summary.clone())
    }
}
