use axum::{
    extract::{Path, Query, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::prometheus;
use crate::models::api::{
    DailyRangeQuery, HistoryQuery, SuccessRatesResponse, TrendQuery, DEFAULT_TREND_DAYS,
};
use crate::util::{date_to_utc, day_window};
use crate::AppState;

/// GET /metrics: Prometheus scrape across all organizations.
pub async fn prometheus_scrape(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!(handler = "prometheus_scrape", "Handler: GET /metrics");

    let snapshot = state.prometheus.collect().await;
    let body = prometheus::format(&snapshot);

    tracing::debug!(
        handler = "prometheus_scrape",
        bytes = body.len(),
        collected_at = %snapshot.collected_at,
        "Responding: exposition text"
    );

    ([(CONTENT_TYPE, prometheus::CONTENT_TYPE)], body)
}

/// GET /api/v1/orgs/{org_id}/metrics: live snapshot, not persisted.
pub async fn get_live_metrics(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "get_live_metrics",
        org_id = %org_id,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics"
    );

    let history = state.collector.collect_metrics(org_id).await?;

    tracing::info!(
        handler = "get_live_metrics",
        org_id = %org_id,
        backup_count = history.backup_count,
        status = 200,
        "Responding: live metrics"
    );

    Ok(Json(history))
}

/// GET /api/v1/orgs/{org_id}/metrics/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "get_dashboard",
        org_id = %org_id,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/dashboard"
    );

    let stats = state.collector.get_dashboard_stats(org_id).await?;

    tracing::info!(handler = "get_dashboard", org_id = %org_id, status = 200, "Responding: dashboard stats");
    Ok(Json(stats))
}

pub async fn get_success_rates(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "get_success_rates",
        org_id = %org_id,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/success-rates"
    );

    let (rate_7d, rate_30d) = state.collector.get_backup_success_rates(org_id).await?;

    Ok(Json(SuccessRatesResponse { rate_7d, rate_30d }))
}

pub async fn get_storage_trend(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    let days = params.days();
    tracing::info!(
        handler = "get_storage_trend",
        org_id = %org_id,
        days,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/trends/storage"
    );

    let points = state.collector.get_storage_growth_trend(org_id, days).await?;
    Ok(Json(points))
}

pub async fn get_duration_trend(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    let days = params.days();
    tracing::info!(
        handler = "get_duration_trend",
        org_id = %org_id,
        days,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/trends/duration"
    );

    let points = state.collector.get_backup_duration_trend(org_id, days).await?;
    Ok(Json(points))
}

pub async fn get_daily_trend(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<TrendQuery>,
) -> Result<impl IntoResponse, AppError> {
    let days = params.days();
    tracing::info!(
        handler = "get_daily_trend",
        org_id = %org_id,
        days,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/trends/daily"
    );

    let stats = state.collector.get_daily_backup_stats(org_id, days).await?;
    Ok(Json(stats))
}

pub async fn get_repository_storage(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "get_repository_storage",
        org_id = %org_id,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/storage/repositories"
    );

    let stats = state.collector.get_repository_storage(org_id).await?;
    Ok(Json(stats))
}

/// GET /api/v1/orgs/{org_id}/metrics/history: persisted snapshots, newest first.
pub async fn get_history(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit();
    tracing::info!(
        handler = "get_history",
        org_id = %org_id,
        limit,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/history"
    );

    let history = state.collector.get_metrics_history(org_id, limit).await?;

    tracing::info!(
        handler = "get_history",
        org_id = %org_id,
        returned = history.len(),
        status = 200,
        "Responding: metrics history"
    );

    Ok(Json(history))
}

/// GET /api/v1/orgs/{org_id}/metrics/daily: stored daily rollups.
pub async fn get_daily_summaries(
    State(state): State<AppState>,
    Path(org_id): Path<Uuid>,
    Query(params): Query<DailyRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let to = params.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = match params.from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_TREND_DAYS - 1))
            .ok_or_else(|| AppError::BadRequest(format!("to {to} is out of range")))?,
    };

    tracing::info!(
        handler = "get_daily_summaries",
        org_id = %org_id,
        from = %from,
        to = %to,
        "Handler: GET /api/v1/orgs/{{org_id}}/metrics/daily"
    );

    if from > to {
        tracing::warn!(handler = "get_daily_summaries", "Validation failed: from after to");
        return Err(AppError::BadRequest(format!("from {from} is after to {to}")));
    }

    let (start, _) = day_window(date_to_utc(from))?;
    let (_, end) = day_window(date_to_utc(to))?;

    tracing::debug!(handler = "get_daily_summaries", "Dispatching to store.get_daily_summaries");
    let summaries = state.store.get_daily_summaries(org_id, start, end).await?;

    tracing::info!(
        handler = "get_daily_summaries",
        org_id = %org_id,
        returned = summaries.len(),
        status = 200,
        "Responding: daily summaries"
    );

    Ok(Json(summaries))
}
