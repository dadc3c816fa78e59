//! Metrics collection and aggregation.
//!
//! - [`collector::Collector`]: live per-organization snapshots and dashboard stats.
//! - [`aggregator::Aggregator`]: per-day rollups written back to the store.
//! - [`prometheus::PrometheusCollector`]: cached fleet-wide scrape output.
//!
//! All three fold rows through [`fold`], so classification rules live in one place.

pub mod aggregator;
pub mod cache;
pub mod collector;
pub mod fold;
pub mod prometheus;
pub mod soft;

#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::Aggregator;
pub use cache::MetricsCache;
pub use collector::Collector;
pub use prometheus::{PrometheusCollector, PrometheusMetrics};
