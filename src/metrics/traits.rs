//! # Metrics Trait Hierarchy
//!
//! ```text
//!   ┌─────────────────────────────┐
//!   │    TableMetricsRecorder     │   written by CacheTable (&self, atomics)
//!   │ get_hit/get_miss/load       │
//!   │ insert/remove/expire/flush  │
//!   └──────────────┬──────────────┘
//!                  │
//!   Consumption (decoupled from recording):
//!   ┌──────────────────────────────┐    ┌──────────────────────────────┐
//!   │ MetricsSnapshotProvider<S>   │    │ MetricsExporter<S>           │
//!   │ (tests, dashboards)          │    │ (production monitoring)      │
//!   └──────────────────────────────┘    └──────────────────────────────┘
//! ```
//!
//! Recorders take `&self` because tables are shared across threads; the
//! counters behind them are relaxed atomics.

/// Counters every cache table maintains.
pub trait TableMetricsRecorder {
    fn record_get_hit(&self);
    fn record_get_miss(&self);
    fn record_load(&self);
    fn record_insert_new(&self);
    fn record_insert_update(&self);
    fn record_remove(&self);
    fn record_expired(&self, count: u64);
    fn record_sweep(&self);
    fn record_flush(&self, flushed: u64);
}

/// Snapshot provider for tests and monitoring.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}

/// Reset metrics between tests or benchmark iterations.
pub trait MetricsReset {
    fn reset_metrics(&self);
}

/// Export/publish metrics to production monitoring backends.
pub trait MetricsExporter<S> {
    fn export(&self, snapshot: &S);
}
