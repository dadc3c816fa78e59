use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::metrics::MetricsDailySummary;
use super::trends::BackupSuccessRate;

pub const DEFAULT_TREND_DAYS: i64 = 30;
pub const MAX_TREND_DAYS: i64 = 365;
pub const DEFAULT_HISTORY_LIMIT: i64 = 100;
pub const MAX_HISTORY_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct TrendQuery {
    pub days: Option<i64>,
}

impl TrendQuery {
    pub fn days(&self) -> i64 {
        self.days
            .unwrap_or(DEFAULT_TREND_DAYS)
            .clamp(1, MAX_TREND_DAYS)
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

/// `from`/`to` are inclusive UTC dates. Missing bounds default to the
/// last `DEFAULT_TREND_DAYS` days ending today.
#[derive(Debug, Deserialize)]
pub struct DailyRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct SuccessRatesResponse {
    #[serde(rename = "rate7d")]
    pub rate_7d: Option<BackupSuccessRate>,
    #[serde(rename = "rate30d")]
    pub rate_30d: Option<BackupSuccessRate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    pub date: NaiveDate,
    pub org_id: Option<Uuid>,
    /// With `org_id`, aggregate every day from `date` through this one.
    pub through: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub organizations: usize,
    pub summaries: Vec<MetricsDailySummary>,
}
