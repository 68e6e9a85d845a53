pub use crate::builder::TableBuilder;
pub use crate::config::{SweepStrategy, TableConfig};
pub use crate::entry::{CacheEntry, ExpireCallback};
pub use crate::error::{CacheError, ConfigError, Result};
#[cfg(feature = "metrics")]
pub use crate::metrics::snapshot::TableMetricsSnapshot;
#[cfg(feature = "metrics")]
pub use crate::metrics::traits::{MetricsExporter, MetricsReset, MetricsSnapshotProvider};
pub use crate::registry::TableRegistry;
pub use crate::table::{CacheTable, EntryHook, LoadHook};
