use std::io::{self, Write};

use parking_lot::Mutex;

use crate::metrics::snapshot::TableMetricsSnapshot;
use crate::metrics::traits::MetricsExporter;

/// Writes table snapshots in the Prometheus text exposition format.
///
/// Each export holds the writer lock for the whole snapshot, so concurrent
/// exports never interleave their lines.
#[derive(Debug)]
pub struct PrometheusTextExporter<W: Write + Send + Sync> {
    namespace: String,
    writer: Mutex<W>,
}

enum Kind {
    Counter,
    Gauge,
}

impl<W: Write + Send + Sync> PrometheusTextExporter<W> {
    /// `namespace` prefixes every metric name (`{namespace}_get_hits_total`);
    /// an empty namespace leaves names bare.
    pub fn new(namespace: impl Into<String>, writer: W) -> Self {
        Self {
            namespace: namespace.into(),
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn render(&self, out: &mut W, snapshot: &TableMetricsSnapshot) -> io::Result<()> {
        let series = [
            ("get_calls_total", "Lookups through value()", Kind::Counter, snapshot.get_calls),
            ("get_hits_total", "Lookups answered by a live entry", Kind::Counter, snapshot.get_hits),
            ("get_misses_total", "Lookups that found no live entry", Kind::Counter, snapshot.get_misses),
            ("loads_total", "Misses filled by the loader", Kind::Counter, snapshot.loads),
            ("insert_new_total", "Entries added under a new key", Kind::Counter, snapshot.insert_new),
            ("insert_updates_total", "Entries that replaced an existing key", Kind::Counter, snapshot.insert_updates),
            ("removes_total", "Explicit removals", Kind::Counter, snapshot.removes),
            ("expired_entries_total", "Entries removed by expiry", Kind::Counter, snapshot.expired_entries),
            ("sweeps_total", "Expiry passes", Kind::Counter, snapshot.sweeps),
            ("flushes_total", "Flush calls", Kind::Counter, snapshot.flushes),
            ("flushed_entries_total", "Entries removed by flush", Kind::Counter, snapshot.flushed_entries),
            ("entries", "Entries held at snapshot time", Kind::Gauge, snapshot.table_len as u64),
        ];

        for (suffix, help, kind, value) in series {
            let name = if self.namespace.is_empty() {
                suffix.to_owned()
            } else {
                format!("{}_{suffix}", self.namespace)
            };
            let kind = match kind {
                Kind::Counter => "counter",
                Kind::Gauge => "gauge",
            };
            writeln!(out, "# HELP {name} {help}")?;
            writeln!(out, "# TYPE {name} {kind}")?;
            writeln!(out, "{name} {value}")?;
        }
        out.flush()
    }
}

impl<W: Write + Send + Sync> MetricsExporter<TableMetricsSnapshot> for PrometheusTextExporter<W> {
    fn export(&self, snapshot: &TableMetricsSnapshot) {
        let mut writer = self.writer.lock();
        if let Err(err) = self.render(&mut writer, snapshot) {
            tracing::warn!(error = %err, "failed to export table metrics");
        }
    }
}
