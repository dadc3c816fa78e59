//! Periodic background work spawned by the server binary.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, ResultExt};
use crate::metrics::{Aggregator, Collector};
use crate::repository::MetricsStore;

/// Re-aggregate yesterday and today for every organization.
///
/// Yesterday is re-run to pick up backups recorded after its last pass.
pub async fn aggregation_tick(aggregator: &Aggregator, now: DateTime<Utc>) {
    for day in [now - chrono::Duration::days(1), now] {
        match aggregator.aggregate_all_orgs(day).await {
            Ok(count) => tracing::info!(
                day = %day.date_naive(),
                organizations = count,
                "Daily aggregation complete"
            ),
            Err(e) => tracing::error!(
                day = %day.date_naive(),
                error = %e,
                "Daily aggregation failed"
            ),
        }
    }
}

/// Persist one live snapshot per organization. Returns how many were written.
pub async fn snapshot_tick(
    collector: &Collector,
    store: &dyn MetricsStore,
) -> Result<usize, AppError> {
    let orgs = store
        .get_all_organizations()
        .await
        .context("get organizations")?;

    let mut written = 0;
    for org in &orgs {
        let result = match collector.collect_metrics(org.id).await {
            Ok(history) => store
                .create_metrics_history(&history)
                .await
                .context("store metrics history"),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => written += 1,
            Err(e) => tracing::warn!(org_id = %org.id, error = %e, "Metrics snapshot failed"),
        }
    }

    Ok(written)
}

/// Background job: keep daily summaries current.
pub async fn aggregation_job(aggregator: Arc<Aggregator>, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        aggregation_tick(&aggregator, Utc::now()).await;
    }
}

/// Background job: record metrics history.
pub async fn snapshot_job(
    collector: Arc<Collector>,
    store: Arc<dyn MetricsStore>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        match snapshot_tick(&collector, store.as_ref()).await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!("Recorded {} metrics snapshots", count);
                }
            }
            Err(e) => tracing::error!("Snapshot job error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::{agent, backup, FakeStore};
    use crate::models::agent::AgentStatus;
    use chrono::TimeZone;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_aggregation_tick_covers_yesterday_and_today() {
        let store = Arc::new(FakeStore::default());
        let org = store.add_org("acme");
        let agent_id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 0, 30, 0).unwrap();
        store.add_backup(backup(
            org,
            agent_id,
            "completed",
            now - chrono::Duration::hours(1),
            Some(60),
            Some(10),
        ));
        store.add_backup(backup(org, agent_id, "failed", now, None, None));

        let aggregator = Aggregator::new(store.clone());
        aggregation_tick(&aggregator, now).await;

        let mut summaries = store.daily_summaries();
        summaries.sort_by_key(|s| s.date);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].date, Utc.with_ymd_and_hms(2025, 1, 14, 0, 0, 0).unwrap());
        assert_eq!(summaries[0].successful_backups, 1);
        assert_eq!(summaries[1].failed_backups, 1);
    }

    #[tokio::test]
    async fn test_snapshot_tick_skips_failing_org() {
        let store = Arc::new(FakeStore::default());
        let healthy = store.add_org("healthy");
        let broken = store.add_org("broken");
        store.add_agent(agent(healthy, AgentStatus::Active));
        store.fail_for_org("get_agents_by_org_id", broken);

        let collector = Collector::new(store.clone());
        let written = snapshot_tick(&collector, store.as_ref()).await.unwrap();
        assert_eq!(written, 1);

        let history = store.get_metrics_history(healthy, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].agent_online_count, 1);
        assert!(store.get_metrics_history(broken, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_tick_fails_without_organizations() {
        let store = Arc::new(FakeStore::default());
        store.fail("get_all_organizations");

        let collector = Collector::new(store.clone());
        let err = snapshot_tick(&collector, store.as_ref()).await.unwrap_err();
        assert!(err.to_string().starts_with("get organizations: "));
    }
}
