use std::env;
use std::str::FromStr;
use std::time::Duration;

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub prometheus_cache_ttl: Duration,
    pub aggregation_interval: Duration,
    /// `None` disables the snapshot job.
    pub snapshot_interval: Option<Duration>,
    pub max_payload_bytes: usize,
    pub admin_token: Option<String>,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        let snapshot_secs: u64 = parse_or("SNAPSHOT_INTERVAL_SECS", 900);

        Self {
            port: parse_or("PORT", 3000),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:keldris-metrics.db".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            prometheus_cache_ttl: Duration::from_secs(parse_or("PROMETHEUS_CACHE_TTL_SECS", 15)),
            // tokio's interval panics on a zero period
            aggregation_interval: Duration::from_secs(
                parse_or("AGGREGATION_INTERVAL_SECS", 3600u64).max(1),
            ),
            snapshot_interval: (snapshot_secs > 0).then(|| Duration::from_secs(snapshot_secs)),
            max_payload_bytes: parse_or("MAX_PAYLOAD_BYTES", 65_536), // 64 KiB
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }
}
