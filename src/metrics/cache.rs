use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

struct Entry<T> {
    value: Arc<T>,
    stored_at: Instant,
}

/// Single-slot, time-bounded cache.
///
/// The slot sits behind a read/write lock that is only held to inspect or
/// swap the entry; recomputation runs outside it. A separate refresh gate lets
/// only one caller recompute at a time, and callers queued behind it pick up
/// the fresh value instead of recomputing again.
pub struct MetricsCache<T> {
    ttl: Duration,
    slot: RwLock<Option<Entry<T>>>,
    refresh: Mutex<()>,
}

impl<T> MetricsCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// The cached value, if it is younger than the TTL.
    pub async fn get_fresh(&self) -> Option<Arc<T>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Overwrite the slot unconditionally.
    pub async fn store(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        *self.slot.write().await = Some(Entry {
            value: value.clone(),
            stored_at: Instant::now(),
        });
        value
    }

    /// Drop the cached value so the next read recomputes.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Return the fresh value or compute, store and return a new one.
    pub async fn get_or_refresh<F, Fut>(&self, compute: F) -> Arc<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(value) = self.get_fresh().await {
            return value;
        }

        let _gate = self.refresh.lock().await;
        // Another caller may have refreshed while we waited on the gate.
        if let Some(value) = self.get_fresh().await {
            return value;
        }

        let value = compute().await;
        self.store(value).await
    }
}
