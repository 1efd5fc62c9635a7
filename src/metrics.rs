//! Lightweight global metrics.
//!
//! Потокобезопасные атомарные счётчики buffer pool / pager:
//! - fetch (hit/miss)
//! - allocate
//! - write-back и вытеснения

use std::sync::atomic::{AtomicU64, Ordering};

static BLOCKS_FETCHED: AtomicU64 = AtomicU64::new(0);
static CACHE_HITS: AtomicU64 = AtomicU64::new(0);
static CACHE_MISSES: AtomicU64 = AtomicU64::new(0);
static BLOCKS_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static BLOCKS_WRITTEN: AtomicU64 = AtomicU64::new(0);
static EVICTIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub blocks_fetched: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub blocks_allocated: u64,
    pub blocks_written: u64,
    pub evictions: u64,
}

impl MetricsSnapshot {
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

pub fn record_fetch(hit: bool) {
    BLOCKS_FETCHED.fetch_add(1, Ordering::Relaxed);
    if hit {
        CACHE_HITS.fetch_add(1, Ordering::Relaxed);
    } else {
        CACHE_MISSES.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_allocate() {
    BLOCKS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_write_back() {
    BLOCKS_WRITTEN.fetch_add(1, Ordering::Relaxed);
}

pub fn record_eviction() {
    EVICTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        blocks_fetched: BLOCKS_FETCHED.load(Ordering::Relaxed),
        cache_hits: CACHE_HITS.load(Ordering::Relaxed),
        cache_misses: CACHE_MISSES.load(Ordering::Relaxed),
        blocks_allocated: BLOCKS_ALLOCATED.load(Ordering::Relaxed),
        blocks_written: BLOCKS_WRITTEN.load(Ordering::Relaxed),
        evictions: EVICTIONS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_ratio_of_empty_snapshot_is_zero() {
        let s = MetricsSnapshot::default();
        assert_eq!(s.cache_hit_ratio(), 0.0);

        let s = MetricsSnapshot {
            cache_hits: 3,
            cache_misses: 1,
            ..MetricsSnapshot::default()
        };
        assert!((s.cache_hit_ratio() - 0.75).abs() < 1e-9);
    }
}
