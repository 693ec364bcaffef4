use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::models::RagResponse;

/// Cumulative cache counters, reset only by [`ResponseCache::reset_metrics`].
#[derive(Debug, Default)]
struct Metrics {
    hit: AtomicU64,
    miss: AtomicU64,
    expired: AtomicU64,
    evicted: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hit: u64,
    pub miss: u64,
    pub expired: u64,
    pub evicted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub ttl_seconds: u64,
    pub metrics: MetricsSnapshot,
}

struct Entry {
    inserted_at: Instant,
    value: RagResponse,
}

/// Bounded, TTL-based in-memory cache for full pipeline responses.
///
/// Expiry is lazy: an entry older than the TTL is removed on the `get` that
/// observes it, counted as `expired` rather than `miss`. Insertion at
/// capacity evicts the single oldest entry by insertion time.
///
/// The map is a single critical section so check-then-act sequences (TTL
/// check, delete, insert) stay atomic across concurrent requests. The cache
/// is a cost/latency optimization, not a consistency mechanism: TTL expiry
/// is an acceptable staleness window.
pub struct ResponseCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
    max_entries: usize,
    enabled: bool,
    metrics: Metrics,
}

impl ResponseCache {
    pub fn new(enabled: bool, ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
            enabled,
            metrics: Metrics::default(),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Stable key over the normalized query, effective top-K and model.
    /// Two logically identical requests always map to the same key.
    pub fn key(query: &str, top_k: usize, model: &str) -> String {
        let raw = format!("q={query}|topk={top_k}|model={model}");
        blake3::hash(raw.as_bytes()).to_hex().to_string()
    }

    pub fn get(&self, key: &str) -> Option<RagResponse> {
        if !self.enabled {
            return None;
        }
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                self.metrics.hit.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.metrics.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.metrics.miss.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: RagResponse) {
        if !self.enabled || self.max_entries == 0 {
            return;
        }
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) && entries.len() >= self.max_entries {
            // Evict the oldest entry by insertion time
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.inserted_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
                self.metrics.evicted.fetch_add(1, Ordering::Relaxed);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                inserted_at: Instant::now(),
                value,
            },
        );
    }

    /// Drop every entry, returning how many were removed.
    pub fn flush(&self) -> usize {
        let mut entries = self.entries.lock();
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.enabled,
            size: self.entries.lock().len(),
            ttl_seconds: self.ttl.as_secs(),
            metrics: MetricsSnapshot {
                hit: self.metrics.hit.load(Ordering::Relaxed),
                miss: self.metrics.miss.load(Ordering::Relaxed),
                expired: self.metrics.expired.load(Ordering::Relaxed),
                evicted: self.metrics.evicted.load(Ordering::Relaxed),
            },
        }
    }

    /// Zero all counters. For test isolation.
    pub fn reset_metrics(&self) {
        self.metrics.hit.store(0, Ordering::Relaxed);
        self.metrics.miss.store(0, Ordering::Relaxed);
        self.metrics.expired.store(0, Ordering::Relaxed);
        self.metrics.evicted.store(0, Ordering::Relaxed);
    }
}
