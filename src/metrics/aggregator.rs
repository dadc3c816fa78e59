use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{AppError, ResultExt};
use crate::metrics::fold::tally_backups;
use crate::models::metrics::MetricsDailySummary;
use crate::repository::MetricsStore;
use crate::util::{date_to_utc, day_window};

/// Recomputes and persists per-day rollups.
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn MetricsStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn MetricsStore>) -> Self {
        Self { store }
    }

    /// Rebuild the summary of the UTC day containing `date` and upsert it.
    ///
    /// Either the full summary is written or nothing is.
    pub async fn aggregate_daily_metrics(
        &self,
        org_id: Uuid,
        date: DateTime<Utc>,
    ) -> Result<MetricsDailySummary, AppError> {
        let (day_start, day_end) = day_window(date)?;

        tracing::debug!(
            org_id = %org_id,
            day = %day_start.date_naive(),
            "aggregator: fetching backups for day"
        );

        let backups = self
            .store
            .get_backups_by_org_id_and_date_range(org_id, day_start, day_end)
            .await
            .context("get backups for date range")?;

        let tally = tally_backups(&backups);
        let now = Utc::now();
        let summary = MetricsDailySummary {
            id: Uuid::new_v4(),
            org_id,
            date: day_start,
            total_backups: tally.total,
            successful_backups: tally.successful,
            failed_backups: tally.failed,
            total_size_bytes: tally.completed_size_bytes,
            total_duration_secs: tally.duration_secs,
            agents_active: tally.agents_active(),
            created_at: now,
            updated_at: now,
        };

        self.store
            .create_or_update_daily_summary(&summary)
            .await
            .context("upsert daily summary")?;

        tracing::debug!(
            org_id = %org_id,
            day = %day_start.date_naive(),
            total_backups = summary.total_backups,
            agents_active = summary.agents_active,
            "aggregator: daily summary upserted"
        );

        Ok(summary)
    }

    /// Aggregate `date` for every organization, continuing past failures.
    ///
    /// Returns the number of organizations processed, or `PartialFailure` when
    /// any of them failed. Successful organizations keep their upserted rows
    /// either way.
    pub async fn aggregate_all_orgs(&self, date: DateTime<Utc>) -> Result<usize, AppError> {
        day_window(date)?;

        let orgs = self
            .store
            .get_all_organizations()
            .await
            .context("get organizations")?;

        let total = orgs.len();
        let mut failed = 0usize;

        for org in &orgs {
            if let Err(e) = self.aggregate_daily_metrics(org.id, date).await {
                tracing::warn!(
                    org_id = %org.id,
                    day = %date.date_naive(),
                    error = %e,
                    "aggregator: organization failed"
                );
                failed += 1;
            }
        }

        tracing::info!(
            day = %date.date_naive(),
            organizations = total,
            failed,
            "aggregator: batch complete"
        );

        if failed > 0 {
            return Err(AppError::PartialFailure { failed, total });
        }

        Ok(total)
    }

    /// Aggregate every day in `from..=to` for one organization, oldest first.
    /// Stops at the first failing day.
    pub async fn backfill(
        &self,
        org_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<MetricsDailySummary>, AppError> {
        if from > to {
            return Err(AppError::BadRequest(format!(
                "backfill range is empty: {from} is after {to}"
            )));
        }

        let mut summaries = Vec::new();
        for day in from.iter_days().take_while(|d| *d <= to) {
            summaries.push(self.aggregate_daily_metrics(org_id, date_to_utc(day)).await?);
        }
        Ok(summaries)
    }
}
