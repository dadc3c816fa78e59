use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::error::AppError;
use crate::models::api::{AggregateRequest, AggregateResponse};
use crate::util::date_to_utc;
use crate::AppState;

/// POST /admin/metrics/aggregate: rebuild daily summaries on demand.
///
/// `orgId` limits the run to one organization; `through` then turns it into
/// a backfill over `date..=through`. Without `orgId` every organization is
/// aggregated for `date`.
pub async fn run_aggregation(
    State(state): State<AppState>,
    Json(body): Json<AggregateRequest>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!(
        handler = "run_aggregation",
        date = %body.date,
        org_id = ?body.org_id,
        through = ?body.through,
        "Handler: POST /admin/metrics/aggregate"
    );

    let response = match (body.org_id, body.through) {
        (Some(org_id), Some(through)) => {
            tracing::debug!(handler = "run_aggregation", "Dispatching to aggregator.backfill");
            let summaries = state.aggregator.backfill(org_id, body.date, through).await?;
            AggregateResponse {
                organizations: 1,
                summaries,
            }
        }
        (Some(org_id), None) => {
            tracing::debug!(
                handler = "run_aggregation",
                "Dispatching to aggregator.aggregate_daily_metrics"
            );
            let summary = state
                .aggregator
                .aggregate_daily_metrics(org_id, date_to_utc(body.date))
                .await?;
            AggregateResponse {
                organizations: 1,
                summaries: vec![summary],
            }
        }
        (None, Some(_)) => {
            tracing::warn!(handler = "run_aggregation", "Validation failed: through without orgId");
            return Err(AppError::BadRequest(
                "through requires orgId".to_string(),
            ));
        }
        (None, None) => {
            tracing::debug!(handler = "run_aggregation", "Dispatching to aggregator.aggregate_all_orgs");
            let organizations = state
                .aggregator
                .aggregate_all_orgs(date_to_utc(body.date))
                .await?;
            AggregateResponse {
                organizations,
                summaries: Vec::new(),
            }
        }
    };

    tracing::info!(
        handler = "run_aggregation",
        organizations = response.organizations,
        summaries = response.summaries.len(),
        status = 200,
        "Responding: aggregation complete"
    );

    Ok(Json(response))
}

/// POST /admin/metrics/prometheus/invalidate: force the next scrape to recompute.
pub async fn invalidate_prometheus(State(state): State<AppState>) -> StatusCode {
    tracing::info!(
        handler = "invalidate_prometheus",
        "Handler: POST /admin/metrics/prometheus/invalidate"
    );
    state.prometheus.invalidate().await;
    StatusCode::NO_CONTENT
}
