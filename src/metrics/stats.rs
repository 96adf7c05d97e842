use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Counters updated on every cache request.
///
/// Byte totals are kept as `u128` behind a lock: a trace of a few objects
/// near `u64::MAX` bytes would otherwise wrap a 64-bit sum.
pub struct StatsCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    bytes: Mutex<ByteTotals>,
    evictions: AtomicU64,
    rejections: AtomicU64,
}

#[derive(Default)]
struct ByteTotals {
    hit: u128,
    miss: u128,
}

impl StatsCounter {
    pub fn new() -> Self {
        StatsCounter {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bytes: Mutex::new(ByteTotals::default()),
            evictions: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_hit(&self, bytes: u64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let mut totals = self.bytes.lock();
        totals.hit = totals.hit.saturating_add(u128::from(bytes));
    }

    #[inline]
    pub fn record_miss(&self, bytes: u64) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut totals = self.bytes.lock();
        totals.miss = totals.miss.saturating_add(u128::from(bytes));
    }

    #[inline]
    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss that was not inserted (too large or refused by admission).
    #[inline]
    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the statistics.
    pub fn snapshot(&self) -> Metrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let (byte_hits, byte_misses) = {
            let totals = self.bytes.lock();
            (totals.hit, totals.miss)
        };
        Metrics {
            hits,
            misses,
            byte_hits,
            byte_misses,
            evictions: self.evictions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            miss_ratio: ratio(u128::from(misses), u128::from(hits) + u128::from(misses)),
            byte_miss_ratio: ratio(byte_misses, byte_hits.saturating_add(byte_misses)),
        }
    }
}

impl Default for StatsCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(part: u128, total: u128) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub hits: u64,
    pub misses: u64,
    pub byte_hits: u128,
    pub byte_misses: u128,
    /// Objects removed to make room.
    pub evictions: u64,
    pub rejections: u64,
    /// `misses / requests`, or `0.0` if no requests have been made.
    pub miss_ratio: f64,
    /// `missed bytes / requested bytes`, or `0.0` if nothing was requested.
    pub byte_miss_ratio: f64,
}

impl Metrics {
    pub fn request_count(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }
}
