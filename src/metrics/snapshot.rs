/// Point-in-time copy of a table's counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TableMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub loads: u64, // misses answered by the on_load hook

    pub insert_new: u64,
    pub insert_updates: u64,

    pub removes: u64,
    pub expired_entries: u64,
    pub sweeps: u64,
    pub flushes: u64,
    pub flushed_entries: u64,

    // gauges captured at snapshot time
    pub table_len: usize,
}

impl TableMetricsSnapshot {
    /// Fraction of lookups served from the table, in `[0.0, 1.0]`.
    pub fn hit_ratio(&self) -> f64 {
        if self.get_calls == 0 {
            0.0
        } else {
            self.get_hits as f64 / self.get_calls as f64
        }
    }
}
