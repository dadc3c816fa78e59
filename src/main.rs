use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use keldris_metrics::config::Config;
use keldris_metrics::jobs;
use keldris_metrics::metrics::prometheus::PrometheusCache;
use keldris_metrics::metrics::{Aggregator, Collector, PrometheusCollector};
use keldris_metrics::repository::MetricsStore;
use keldris_metrics::sqlite_repo::SqliteRepository;
use keldris_metrics::{build_app, db, AppState};

fn build_cors(config: &Config) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to initialize database");

    tracing::info!("Database initialized at {}", config.database_url);

    let repo = Arc::new(SqliteRepository::new(pool));
    let store: Arc<dyn MetricsStore> = repo.clone();

    let collector = Arc::new(Collector::new(store.clone()));
    let aggregator = Arc::new(Aggregator::new(store.clone()));
    let cache = Arc::new(PrometheusCache::new(config.prometheus_cache_ttl));
    let prometheus = Arc::new(PrometheusCollector::new(repo, cache));

    if config.admin_token.is_none() {
        tracing::info!("ADMIN_TOKEN not set, admin endpoints disabled");
    }

    let state = AppState {
        store: store.clone(),
        collector: collector.clone(),
        aggregator: aggregator.clone(),
        prometheus,
        admin_token: config.admin_token.as_deref().map(Arc::from),
    };

    let app = build_app(state)
        .layer(RequestBodyLimitLayer::new(config.max_payload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_request(trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    trace::DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
        .layer(build_cors(&config));

    tokio::spawn(jobs::aggregation_job(aggregator, config.aggregation_interval));

    match config.snapshot_interval {
        Some(period) => {
            tokio::spawn(jobs::snapshot_job(collector, store, period));
        }
        None => tracing::info!("SNAPSHOT_INTERVAL_SECS=0, metrics snapshots disabled"),
    }

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutting down...");
}
