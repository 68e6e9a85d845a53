use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::TableMetricsSnapshot;
use crate::metrics::traits::TableMetricsRecorder;

/// Atomic counters backing a table's metrics.
#[derive(Debug, Default)]
pub struct TableMetrics {
    get_hits: AtomicU64,
    get_misses: AtomicU64,
    loads: AtomicU64,
    insert_new: AtomicU64,
    insert_updates: AtomicU64,
    removes: AtomicU64,
    expired_entries: AtomicU64,
    sweeps: AtomicU64,
    flushes: AtomicU64,
    flushed_entries: AtomicU64,
}

impl TableMetrics {
    /// Snapshot current counters; `table_len` is sampled by the caller.
    pub fn snapshot(&self, table_len: usize) -> TableMetricsSnapshot {
        let get_hits = self.get_hits.load(Ordering::Relaxed);
        let get_misses = self.get_misses.load(Ordering::Relaxed);
        TableMetricsSnapshot {
            get_calls: get_hits + get_misses,
            get_hits,
            get_misses,
            loads: self.loads.load(Ordering::Relaxed),
            insert_new: self.insert_new.load(Ordering::Relaxed),
            insert_updates: self.insert_updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            expired_entries: self.expired_entries.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_entries: self.flushed_entries.load(Ordering::Relaxed),
            table_len,
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.get_hits,
            &self.get_misses,
            &self.loads,
            &self.insert_new,
            &self.insert_updates,
            &self.removes,
            &self.expired_entries,
            &self.sweeps,
            &self.flushes,
            &self.flushed_entries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl TableMetricsRecorder for TableMetrics {
    fn record_get_hit(&self) {
        self.get_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_get_miss(&self) {
        self.get_misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_insert_new(&self) {
        self.insert_new.fetch_add(1, Ordering::Relaxed);
    }

    fn record_insert_update(&self) {
        self.insert_updates.fetch_add(1, Ordering::Relaxed);
    }

    fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_expired(&self, count: u64) {
        self.expired_entries.fetch_add(count, Ordering::Relaxed);
    }

    fn record_sweep(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    fn record_flush(&self, flushed: u64) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_entries.fetch_add(flushed, Ordering::Relaxed);
    }
}
