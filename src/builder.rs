//! Builder for cache tables with hooks installed up front.
//!
//! Hooks set through the builder are in place before the table is shared,
//! so no entry can slip in ahead of them.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use cachetable::builder::TableBuilder;
//! use cachetable::config::SweepStrategy;
//!
//! let table = TableBuilder::<u64, String>::new("users")
//!     .sweep(SweepStrategy::Interval(Duration::from_secs(1)))
//!     .load_life_span(Duration::from_secs(60))
//!     .on_load(|id| Some(format!("user-{id}")))
//!     .build();
//!
//! assert_eq!(*table.value(&7).unwrap(), "user-7");
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{SweepStrategy, TableConfig};
use crate::entry::CacheEntry;
use crate::error::ConfigError;
use crate::table::{CacheTable, TableHooks};

/// Builder for [`CacheTable`] instances.
pub struct TableBuilder<K, V> {
    name: String,
    config: TableConfig,
    hooks: TableHooks<K, V>,
}

impl<K, V> TableBuilder<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Create a builder for a table called `name` with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: TableConfig::default(),
            hooks: TableHooks::default(),
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sweep(mut self, sweep: SweepStrategy) -> Self {
        self.config.sweep = sweep;
        self
    }

    pub fn load_life_span(mut self, life_span: Duration) -> Self {
        self.config.load_life_span = life_span;
        self
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.config.initial_capacity = capacity;
        self
    }

    /// Set the loader used on misses.
    pub fn on_load<F>(mut self, loader: F) -> Self
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.hooks.on_load = Some(Arc::new(loader));
        self
    }

    /// Add a hook run after every insert.
    pub fn on_add<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CacheEntry<K, V>) + Send + Sync + 'static,
    {
        self.hooks.on_add.push(Arc::new(hook));
        self
    }

    /// Add a hook run whenever an entry leaves the table.
    pub fn on_delete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CacheEntry<K, V>) + Send + Sync + 'static,
    {
        self.hooks.on_delete.push(Arc::new(hook));
        self
    }

    /// Build the table without validating the configuration.
    ///
    /// A zero sweep interval falls back to adaptive sweeping.
    pub fn build(self) -> Arc<CacheTable<K, V>> {
        CacheTable::with_hooks(self.name, self.config, self.hooks)
    }

    /// Build the table, rejecting invalid configuration.
    pub fn try_build(self) -> Result<Arc<CacheTable<K, V>>, ConfigError> {
        self.config.validate()?;
        Ok(self.build())
    }
}

impl<K, V> fmt::Debug for TableBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("on_load", &self.hooks.on_load.is_some())
            .field("on_add", &self.hooks.on_add.len())
            .field("on_delete", &self.hooks.on_delete.len())
            .finish()
    }
}
