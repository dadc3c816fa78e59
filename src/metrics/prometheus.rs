//! Fleet-wide metrics for the Prometheus scrape endpoint.
//!
//! Collection is cached for a short window so scrape bursts do not turn into
//! store bursts. Every sub-collection is best-effort: a failing store call is
//! logged and leaves its figures at zero, and a scrape never errors.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::cache::MetricsCache;
use crate::metrics::fold::{tally_agents, tally_backups, DURATION_BUCKETS};
use crate::metrics::soft::soft_fetch;
use crate::repository::PrometheusStore;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(15);
pub const METRIC_PREFIX: &str = "keldris_";

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusMetrics {
    pub backup_total: i64,
    pub backups_by_status: BTreeMap<String, i64>,
    /// Cumulative counts aligned with `DURATION_BUCKETS`.
    pub duration_buckets: [i64; DURATION_BUCKETS.len()],
    pub duration_sum: f64,
    pub duration_count: i64,
    pub backup_size_bytes: i64,
    pub agents_total: i64,
    pub agents_online: i64,
    pub storage_used_bytes: i64,
    pub collected_at: DateTime<Utc>,
}

pub type PrometheusCache = MetricsCache<PrometheusMetrics>;

#[derive(Clone)]
pub struct PrometheusCollector {
    store: Arc<dyn PrometheusStore>,
    cache: Arc<PrometheusCache>,
}

impl PrometheusCollector {
    pub fn new(store: Arc<dyn PrometheusStore>, cache: Arc<PrometheusCache>) -> Self {
        Self { store, cache }
    }

    /// Cached metrics, recollected when older than the cache TTL.
    pub async fn collect(&self) -> Arc<PrometheusMetrics> {
        self.cache.get_or_refresh(|| self.collect_uncached()).await
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    async fn collect_uncached(&self) -> PrometheusMetrics {
        tracing::debug!("prometheus: cache stale, collecting");

        let mut metrics = PrometheusMetrics {
            collected_at: Utc::now(),
            ..Default::default()
        };

        self.collect_agents(&mut metrics).await;
        self.collect_backups(&mut metrics).await;
        self.collect_storage(&mut metrics).await;

        tracing::debug!(
            backups = metrics.backup_total,
            agents = metrics.agents_total,
            "prometheus: collection complete"
        );

        metrics
    }

    async fn collect_agents(&self, metrics: &mut PrometheusMetrics) {
        let Ok(agents) = soft_fetch(self.store.get_all_agents().await.map(Some), "all agents", None)
        else {
            return;
        };
        let tally = tally_agents(&agents);
        metrics.agents_total = tally.total;
        metrics.agents_online = tally.online;
    }

    async fn collect_backups(&self, metrics: &mut PrometheusMetrics) {
        let Ok(backups) =
            soft_fetch(self.store.get_all_backups().await.map(Some), "all backups", None)
        else {
            return;
        };
        let tally = tally_backups(&backups);
        metrics.backup_total = tally.total;
        metrics.backups_by_status = tally.by_status;
        metrics.duration_buckets = tally.histogram.buckets;
        metrics.duration_sum = tally.histogram.sum;
        metrics.duration_count = tally.histogram.count;
        metrics.backup_size_bytes = tally.completed_size_bytes;
    }

    async fn collect_storage(&self, metrics: &mut PrometheusMetrics) {
        metrics.storage_used_bytes = soft_fetch(
            self.store.get_storage_stats_summary_global().await,
            "global storage stats summary",
            None,
        )
        .map(|summary| summary.total_raw_size)
        .unwrap_or_default();
    }
}

/// Render metrics in the Prometheus text exposition format.
pub fn format(metrics: &PrometheusMetrics) -> String {
    Exposition(metrics).to_string()
}

struct Exposition<'a>(&'a PrometheusMetrics);

impl Exposition<'_> {
    fn header(f: &mut fmt::Formatter<'_>, name: &str, help: &str, kind: &str) -> fmt::Result {
        writeln!(f, "# HELP {METRIC_PREFIX}{name} {help}")?;
        writeln!(f, "# TYPE {METRIC_PREFIX}{name} {kind}")
    }
}

impl fmt::Display for Exposition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        let p = METRIC_PREFIX;

        Self::header(f, "backup_total", "Total number of backups", "counter")?;
        writeln!(f, "{p}backup_total {}", m.backup_total)?;
        writeln!(f)?;

        Self::header(f, "backup_status_total", "Number of backups by status", "counter")?;
        for (status, count) in &m.backups_by_status {
            writeln!(
                f,
                "{p}backup_status_total{{status=\"{}\"}} {count}",
                escape_label(status)
            )?;
        }
        writeln!(f)?;

        Self::header(
            f,
            "backup_duration_seconds",
            "Backup duration in seconds",
            "histogram",
        )?;
        for (bound, count) in DURATION_BUCKETS.iter().zip(m.duration_buckets) {
            writeln!(f, "{p}backup_duration_seconds_bucket{{le=\"{bound}\"}} {count}")?;
        }
        writeln!(
            f,
            "{p}backup_duration_seconds_bucket{{le=\"+Inf\"}} {}",
            m.duration_count
        )?;
        writeln!(f, "{p}backup_duration_seconds_sum {}", m.duration_sum)?;
        writeln!(f, "{p}backup_duration_seconds_count {}", m.duration_count)?;
        writeln!(f)?;

        Self::header(
            f,
            "backup_size_bytes",
            "Total size of completed backups in bytes",
            "gauge",
        )?;
        writeln!(f, "{p}backup_size_bytes {}", m.backup_size_bytes)?;
        writeln!(f)?;

        Self::header(f, "agents_total", "Total number of registered agents", "gauge")?;
        writeln!(f, "{p}agents_total {}", m.agents_total)?;
        writeln!(f)?;

        Self::header(f, "agents_online", "Number of agents currently online", "gauge")?;
        writeln!(f, "{p}agents_online {}", m.agents_online)?;
        writeln!(f)?;

        Self::header(
            f,
            "storage_used_bytes",
            "Total raw storage used in bytes",
            "gauge",
        )?;
        writeln!(f, "{p}storage_used_bytes {}", m.storage_used_bytes)
    }
}

fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::{agent, backup, FakeStore};
    use crate::models::agent::AgentStatus;
    use crate::models::storage::StorageStatsSummary;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn collector(store: Arc<FakeStore>, ttl: Duration) -> PrometheusCollector {
        PrometheusCollector::new(store, Arc::new(MetricsCache::new(ttl)))
    }

    fn seeded_store() -> Arc<FakeStore> {
        let store = Arc::new(FakeStore::default());
        let org = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap();
        store.add_agent(agent(org, AgentStatus::Active));
        store.add_agent(agent(org, AgentStatus::Offline));
        store.add_agent(agent(Uuid::new_v4(), AgentStatus::Active));
        store.add_backup(backup(org, Uuid::new_v4(), "completed", start, Some(600), Some(2048)));
        store.add_backup(backup(org, Uuid::new_v4(), "completed", start, Some(600), Some(2048)));
        store.add_backup(backup(org, Uuid::new_v4(), "failed", start, None, None));
        store.set_global_storage_summary(StorageStatsSummary {
            total_raw_size: 123_456,
            ..Default::default()
        });
        store
    }

    #[tokio::test]
    async fn test_collect_is_fleet_wide() {
        let metrics = collector(seeded_store(), DEFAULT_CACHE_TTL).collect().await;

        assert_eq!(metrics.agents_total, 3);
        assert_eq!(metrics.agents_online, 2);
        assert_eq!(metrics.backup_total, 3);
        assert_eq!(metrics.backups_by_status.get("completed"), Some(&2));
        assert_eq!(metrics.backups_by_status.get("failed"), Some(&1));
        assert_eq!(metrics.duration_count, 2);
        assert_eq!(metrics.duration_sum, 1200.0);
        assert_eq!(metrics.duration_buckets, [0, 0, 2, 2, 2, 2, 2, 2]);
        assert_eq!(metrics.backup_size_bytes, 4096);
        assert_eq!(metrics.storage_used_bytes, 123_456);
    }

    #[tokio::test]
    async fn test_cached_within_ttl() {
        let store = seeded_store();
        let collector = collector(store.clone(), DEFAULT_CACHE_TTL);

        let first = collector.collect().await;
        let second = collector.collect().await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.collected_at, second.collected_at);
        assert_eq!(store.calls("get_all_agents"), 1);
        assert_eq!(store.calls("get_all_backups"), 1);
        assert_eq!(store.calls("get_storage_stats_summary_global"), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_recollects() {
        let store = seeded_store();
        let collector = collector(store.clone(), Duration::ZERO);

        collector.collect().await;
        collector.collect().await;

        assert_eq!(store.calls("get_all_agents"), 2);
        assert_eq!(store.calls("get_all_backups"), 2);
        assert_eq!(store.calls("get_storage_stats_summary_global"), 2);
    }

    #[tokio::test]
    async fn test_invalidate_recollects() {
        let store = seeded_store();
        let collector = collector(store.clone(), DEFAULT_CACHE_TTL);

        collector.collect().await;
        collector.invalidate().await;
        collector.collect().await;

        assert_eq!(store.calls("get_all_backups"), 2);
    }

    #[tokio::test]
    async fn test_sub_collection_failures_are_independent() {
        let store = seeded_store();
        store.fail("get_all_backups");

        let metrics = collector(store.clone(), DEFAULT_CACHE_TTL).collect().await;

        assert_eq!(metrics.backup_total, 0);
        assert!(metrics.backups_by_status.is_empty());
        assert_eq!(metrics.agents_total, 3);
        assert_eq!(metrics.storage_used_bytes, 123_456);
    }

    #[tokio::test]
    async fn test_all_sub_collections_failing_still_yields_metrics() {
        let store = seeded_store();
        store.fail("get_all_agents");
        store.fail("get_all_backups");
        store.fail("get_storage_stats_summary_global");

        let metrics = collector(store, DEFAULT_CACHE_TTL).collect().await;
        assert_eq!(metrics.agents_total, 0);
        assert_eq!(metrics.backup_total, 0);
        assert_eq!(metrics.storage_used_bytes, 0);
    }

    #[test]
    fn test_format_exact_output() {
        let mut backups_by_status = BTreeMap::new();
        backups_by_status.insert("failed".to_string(), 1);
        backups_by_status.insert("completed".to_string(), 2);
        let metrics = PrometheusMetrics {
            backup_total: 3,
            backups_by_status,
            duration_buckets: [0, 0, 2, 2, 2, 2, 2, 2],
            duration_sum: 1200.0,
            duration_count: 2,
            backup_size_bytes: 4096,
            agents_total: 3,
            agents_online: 2,
            storage_used_bytes: 123456,
            collected_at: Utc::now(),
        };

        let expected = "\
# HELP keldris_backup_total Total number of backups
# TYPE keldris_backup_total counter
keldris_backup_total 3

# HELP keldris_backup_status_total Number of backups by status
# TYPE keldris_backup_status_total counter
keldris_backup_status_total{status=\"completed\"} 2
keldris_backup_status_total{status=\"failed\"} 1

# HELP keldris_backup_duration_seconds Backup duration in seconds
# TYPE keldris_backup_duration_seconds histogram
keldris_backup_duration_seconds_bucket{le=\"60\"} 0
keldris_backup_duration_seconds_bucket{le=\"300\"} 0
keldris_backup_duration_seconds_bucket{le=\"600\"} 2
keldris_backup_duration_seconds_bucket{le=\"1800\"} 2
keldris_backup_duration_seconds_bucket{le=\"3600\"} 2
keldris_backup_duration_seconds_bucket{le=\"7200\"} 2
keldris_backup_duration_seconds_bucket{le=\"14400\"} 2
keldris_backup_duration_seconds_bucket{le=\"28800\"} 2
keldris_backup_duration_seconds_bucket{le=\"+Inf\"} 2
keldris_backup_duration_seconds_sum 1200
keldris_backup_duration_seconds_count 2

# HELP keldris_backup_size_bytes Total size of completed backups in bytes
# TYPE keldris_backup_size_bytes gauge
keldris_backup_size_bytes 4096

# HELP keldris_agents_total Total number of registered agents
# TYPE keldris_agents_total gauge
keldris_agents_total 3

# HELP keldris_agents_online Number of agents currently online
# TYPE keldris_agents_online gauge
keldris_agents_online 2

# HELP keldris_storage_used_bytes Total raw storage used in bytes
# TYPE keldris_storage_used_bytes gauge
keldris_storage_used_bytes 123456
";
        assert_eq!(format(&metrics), expected);
    }

    #[test]
    fn test_format_escapes_status_labels() {
        let mut metrics = PrometheusMetrics::default();
        metrics.backups_by_status.insert("we\"ird\\".to_string(), 1);
        let text = format(&metrics);
        assert!(text.contains("keldris_backup_status_total{status=\"we\\\"ird\\\\\"} 1\n"));
    }

    #[test]
    fn test_format_fractional_sum() {
        let metrics = PrometheusMetrics {
            duration_sum: 12.5,
            duration_count: 1,
            ..Default::default()
        };
        assert!(format(&metrics).contains("keldris_backup_duration_seconds_sum 12.5\n"));
    }
}
