//! Configuration for cache tables.

use std::time::Duration;

use crate::error::ConfigError;

/// Default life span for entries synthesized by a table's loader
/// (zero: loaded entries never expire unless the caller picks a TTL).
pub const DEFAULT_LOAD_LIFE_SPAN: Duration = Duration::ZERO;

/// Default number of slots reserved in a new table's map.
pub const DEFAULT_INITIAL_CAPACITY: usize = 0;

/// How a table finds and removes expired entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepStrategy {
    /// A background thread sleeps until the nearest entry deadline and is
    /// re-armed whenever an earlier deadline is added.
    #[default]
    Adaptive,
    /// A background thread scans the table at a fixed period.
    Interval(Duration),
    /// No background thread; expiry happens on read and through
    /// [`CacheTable::expire_now`](crate::table::CacheTable::expire_now).
    Manual,
}

/// Configuration for a cache table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Background expiration strategy.
    pub sweep: SweepStrategy,

    /// Life span given to entries produced by the table's loader hook when
    /// the caller does not choose one.
    pub load_life_span: Duration,

    /// Number of entries to reserve space for up front.
    pub initial_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            sweep: SweepStrategy::default(),
            load_life_span: DEFAULT_LOAD_LIFE_SPAN,
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
        }
    }
}

impl TableConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expiration sweep strategy.
    pub fn with_sweep(mut self, sweep: SweepStrategy) -> Self {
        self.sweep = sweep;
        self
    }

    /// Set the life span of loader-synthesized entries.
    pub fn with_load_life_span(mut self, life_span: Duration) -> Self {
        self.load_life_span = life_span;
        self
    }

    /// Reserve space for `capacity` entries.
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Check parameters that would leave the sweeper unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let SweepStrategy::Interval(period) = self.sweep {
            if period.is_zero() {
                return Err(ConfigError::new("sweep", "interval must be greater than zero"));
            }
        }
        Ok(())
    }
}
