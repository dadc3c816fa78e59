pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod sqlite_repo;
pub mod util;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use metrics::{Aggregator, Collector, PrometheusCollector};
use repository::MetricsStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MetricsStore>,
    pub collector: Arc<Collector>,
    pub aggregator: Arc<Aggregator>,
    pub prometheus: Arc<PrometheusCollector>,
    /// Bearer token for `/admin`; the admin routes answer 404 while unset.
    pub admin_token: Option<Arc<str>>,
}

fn org_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/orgs/{org_id}/metrics",
            get(handlers::metrics::get_live_metrics),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/dashboard",
            get(handlers::metrics::get_dashboard),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/success-rates",
            get(handlers::metrics::get_success_rates),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/trends/storage",
            get(handlers::metrics::get_storage_trend),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/trends/duration",
            get(handlers::metrics::get_duration_trend),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/trends/daily",
            get(handlers::metrics::get_daily_trend),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/storage/repositories",
            get(handlers::metrics::get_repository_storage),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/history",
            get(handlers::metrics::get_history),
        )
        .route(
            "/api/v1/orgs/{org_id}/metrics/daily",
            get(handlers::metrics::get_daily_summaries),
        )
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::prometheus_scrape))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/admin/metrics/aggregate",
            post(handlers::admin::run_aggregation),
        )
        .route(
            "/admin/metrics/prometheus/invalidate",
            post(handlers::admin::invalidate_prometheus),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_auth::require_admin_token,
        ))
}

/// Build the full application router (used by main and tests).
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(org_routes())
        .merge(public_routes())
        .merge(admin_routes(&state))
        .with_state(state)
}
