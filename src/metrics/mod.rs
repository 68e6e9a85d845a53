//! Per-table operation counters (feature `metrics`).
//!
//! Tables record through [`traits::TableMetricsRecorder`]. Callers read a
//! [`snapshot::TableMetricsSnapshot`] through
//! [`traits::MetricsSnapshotProvider`] and hand it to an exporter.

pub mod exporter;
pub mod metrics_impl;
pub mod snapshot;
pub mod traits;
