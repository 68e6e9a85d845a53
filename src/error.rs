//! Error types for the cachetable library.
//!
//! ## Key Components
//!
//! - [`CacheError`]: Returned by table lookups and removals. The only
//!   recoverable condition a table reports is a missing key.
//! - [`ConfigError`]: Names the configuration field that failed validation
//!   and why (a zero sweep interval, for instance).
//!
//! ## Example Usage
//!
//! ```
//! use std::time::Duration;
//!
//! use cachetable::error::CacheError;
//! use cachetable::table::CacheTable;
//! use cachetable::config::TableConfig;
//!
//! let table: std::sync::Arc<CacheTable<String, u32>> =
//!     CacheTable::new("errors", TableConfig::default());
//! table.add("a".to_string(), Duration::ZERO, 1);
//!
//! assert!(table.value(&"a".to_string()).is_ok());
//! assert!(matches!(table.value(&"b".to_string()), Err(CacheError::NotFound)));
//! ```

// ---------------------------------------------------------------------------
// CacheError
// ---------------------------------------------------------------------------

/// Error type for table operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The key is not present in the table (never added, removed, or expired).
    #[error("key not found in cache table")]
    NotFound,
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, CacheError>;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Rejected table configuration.
///
/// Produced by [`TableConfig::validate`](crate::config::TableConfig::validate)
/// and [`TableBuilder::try_build`](crate::builder::TableBuilder::try_build).
///
/// ```
/// use std::time::Duration;
///
/// use cachetable::config::{SweepStrategy, TableConfig};
///
/// let err = TableConfig::new()
///     .with_sweep(SweepStrategy::Interval(Duration::ZERO))
///     .validate()
///     .unwrap_err();
/// assert_eq!(err.field(), "sweep");
/// assert!(err.to_string().contains("interval"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid `{field}`: {reason}")]
pub struct ConfigError {
    field: &'static str,
    reason: String,
}

impl ConfigError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the [`TableConfig`](crate::config::TableConfig) field at fault.
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}
