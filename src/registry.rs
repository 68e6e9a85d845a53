//! Name → table directory handing out one shared table per name.
//!
//! ## Architecture
//!
//! ```text
//!   TableRegistry<K, V>
//!   ┌──────────────────────────────────────────────────────┐
//!   │ config: TableConfig          (applied to new tables) │
//!   │ tables: RwLock<FxHashMap<String, Arc<CacheTable>>>   │
//!   └──────────────────────────────────────────────────────┘
//!
//!   cache(name):
//!     read lock  → hit? return it                 (common path, shared)
//!     write lock → re-check → construct + insert  (first access per name)
//! ```
//!
//! The registry is an ordinary value: construct one at startup and share it
//! (typically as `Arc<TableRegistry<K, V>>`) with the code that needs tables.
//! No user code runs while the registry lock is held.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//!
//! use cachetable::registry::TableRegistry;
//!
//! let registry: TableRegistry<String, u64> = TableRegistry::new();
//! let a = registry.cache("users");
//! let b = registry.cache("users");
//! assert!(Arc::ptr_eq(&a, &b));
//! assert_eq!(registry.len(), 1);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::TableConfig;
use crate::table::CacheTable;

/// Process-scoped directory of named cache tables.
pub struct TableRegistry<K, V> {
    config: TableConfig,
    tables: RwLock<FxHashMap<String, Arc<CacheTable<K, V>>>>,
}

impl<K, V> TableRegistry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a registry whose tables use the default configuration.
    pub fn new() -> Self {
        Self::with_config(TableConfig::default())
    }

    /// Creates a registry whose tables are built with `config`.
    pub fn with_config(config: TableConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(FxHashMap::default()),
        }
    }

    /// Returns the table named `name`, creating it on first request.
    ///
    /// Concurrent first requests for the same name all receive the same
    /// instance.
    pub fn cache(&self, name: &str) -> Arc<CacheTable<K, V>> {
        if let Some(table) = self.tables.read().get(name) {
            return Arc::clone(table);
        }

        let mut tables = self.tables.write();
        // Another caller may have won the race between the two locks.
        if let Some(table) = tables.get(name) {
            return Arc::clone(table);
        }
        let table = CacheTable::new(name, self.config.clone());
        tables.insert(name.to_owned(), Arc::clone(&table));
        debug!(table = %name, tables = tables.len(), "registered cache table");
        table
    }

    /// Returns the table named `name` if it was already created.
    pub fn get(&self, name: &str) -> Option<Arc<CacheTable<K, V>>> {
        self.tables.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Names of all registered tables, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Configuration applied to tables this registry creates.
    pub fn config(&self) -> &TableConfig {
        &self.config
    }
}

impl<K, V> Default for TableRegistry<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for TableRegistry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRegistry")
            .field("config", &self.config)
            .field("tables", &self.tables.read().len())
            .finish()
    }
}
