//! Named table of expiring entries.
//!
//! ## Architecture
//!
//! ```text
//!   CacheTable<K, V>
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │ name, config                                                     │
//!   │ items: RwLock<FxHashMap<K, Arc<CacheEntry<K, V>>>>               │
//!   │ hooks: RwLock<TableHooks>   on_load / on_add[] / on_delete[]     │
//!   │ sweeper: Sweeper            background expiry (see `sweep`)      │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lock Discipline
//!
//! - `items` guards only the key → entry map.
//! - Each entry carries its own lock for `accessed_on`, `access_count` and
//!   its about-to-expire callbacks.
//! - No user code (hooks, expire callbacks, loaders, visitors) runs while
//!   `items` or `hooks` is held.
//!
//! ## Expiration Ordering
//!
//! Expiry runs in three steps:
//!
//! ```text
//!   1. read lock   select entries past their deadline, claim each one
//!                  (begin_expiry succeeds for exactly one caller)
//!   2. no lock     run about-to-expire callbacks; the entry is still mapped
//!   3. write lock  detach every claimed entry still mapped under its key,
//!                  then run on_delete hooks with no lock held
//! ```
//!
//! A claim is final: a keep-alive that lands after step 1 does not save the
//! entry. `value` treats a claimed entry as missing, and `remove` leaves it
//! to the expiry that claimed it. An entry replaced by `add` during step 2
//! stays replaced; step 3 only detaches the exact entry it claimed.
//!
//! ## Removal Paths
//!
//! | Path          | about-to-expire | on_delete |
//! |---------------|-----------------|-----------|
//! | expiry        | yes             | yes       |
//! | `flush`       | yes             | yes       |
//! | `remove`      | no              | yes       |
//! | `add` replace | no              | no        |
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cachetable::config::TableConfig;
//! use cachetable::table::CacheTable;
//!
//! let table: Arc<CacheTable<String, String>> = CacheTable::new("sessions", TableConfig::default());
//! table.add("alice".into(), Duration::from_secs(30), "token".into());
//!
//! assert_eq!(*table.value(&"alice".into()).unwrap(), "token");
//! assert_eq!(table.entry(&"alice".into()).unwrap().access_count(), 1);
//!
//! table.set_on_load(|key: &String| Some(format!("loaded:{key}")));
//! assert_eq!(*table.value(&"bob".into()).unwrap(), "loaded:bob");
//! assert_eq!(table.count(), 2);
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::config::TableConfig;
use crate::entry::{CacheEntry, ExpireCallback};
use crate::error::{CacheError, Result};
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::TableMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::TableMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{MetricsReset, MetricsSnapshotProvider, TableMetricsRecorder};
use crate::sweep::{Sweep, Sweeper};

/// Loader invoked on a miss. Returning `None` leaves the key missing.
pub type LoadHook<K, V> = Arc<dyn Fn(&K) -> Option<V> + Send + Sync>;

/// Hook invoked with an entry after it was added or before it is dropped.
pub type EntryHook<K, V> = Arc<dyn Fn(&CacheEntry<K, V>) + Send + Sync>;

pub(crate) struct TableHooks<K, V> {
    pub(crate) on_load: Option<LoadHook<K, V>>,
    pub(crate) on_add: Vec<EntryHook<K, V>>,
    pub(crate) on_delete: Vec<EntryHook<K, V>>,
}

impl<K, V> Default for TableHooks<K, V> {
    fn default() -> Self {
        Self {
            on_load: None,
            on_add: Vec::new(),
            on_delete: Vec::new(),
        }
    }
}

/// Thread-safe table of entries with sliding expiration.
///
/// Created through [`CacheTable::new`], a
/// [`TableBuilder`](crate::builder::TableBuilder), or a
/// [`TableRegistry`](crate::registry::TableRegistry); always handed out as
/// `Arc<CacheTable<K, V>>`.
pub struct CacheTable<K, V> {
    name: String,
    config: TableConfig,
    items: RwLock<FxHashMap<K, Arc<CacheEntry<K, V>>>>,
    hooks: RwLock<TableHooks<K, V>>,
    sweeper: Sweeper,
    #[cfg(feature = "metrics")]
    metrics: TableMetrics,
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a table and, unless the sweep strategy is manual, its sweep
    /// thread.
    pub fn new(name: impl Into<String>, config: TableConfig) -> Arc<Self> {
        Self::with_hooks(name.into(), config, TableHooks::default())
    }

    pub(crate) fn with_hooks(name: String, config: TableConfig, hooks: TableHooks<K, V>) -> Arc<Self> {
        debug!(table = %name, sweep = ?config.sweep, "creating cache table");
        Arc::new_cyclic(|weak| Self {
            sweeper: Sweeper::start(weak.clone(), &name, config.sweep),
            items: RwLock::new(FxHashMap::with_capacity_and_hasher(
                config.initial_capacity,
                Default::default(),
            )),
            hooks: RwLock::new(hooks),
            name,
            config,
            #[cfg(feature = "metrics")]
            metrics: TableMetrics::default(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Returns `true` while the background sweep thread is alive.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    // -- insertion --------------------------------------------------------

    /// Stores `data` under `key`, replacing any previous entry.
    ///
    /// A replaced entry is dropped silently: neither its about-to-expire
    /// callbacks nor the `on_delete` hooks run. A zero `life_span` never
    /// expires.
    pub fn add(&self, key: K, life_span: Duration, data: V) -> Arc<CacheEntry<K, V>> {
        self.insert_entry(CacheEntry::new(key, life_span, data))
    }

    /// Like [`add`](Self::add), with an about-to-expire callback installed
    /// before the entry becomes visible.
    pub fn add_with_callback(
        &self,
        key: K,
        life_span: Duration,
        data: V,
        callback: ExpireCallback<K>,
    ) -> Arc<CacheEntry<K, V>> {
        let entry = CacheEntry::new(key, life_span, data);
        entry.set_about_to_expire_callback(Some(callback));
        self.insert_entry(entry)
    }

    /// Stores `data` only if `key` is missing. Returns `true` on insert.
    ///
    /// An entry that is past its deadline counts as missing; it is expired
    /// first (callbacks included). One already claimed by another expiry is
    /// overwritten; that expiry still notifies for it.
    pub fn add_if_absent(&self, key: K, life_span: Duration, data: V) -> bool {
        let entry = loop {
            {
                let mut items = self.items.write();
                match items.get(&key) {
                    Some(current) if !current.is_expired_at(Instant::now()) && !current.is_expiring() => {
                        return false;
                    },
                    Some(current) if !current.is_expiring() => {},
                    _ => {
                        let entry = Arc::new(CacheEntry::new(key.clone(), life_span, data));
                        items.insert(key, Arc::clone(&entry));
                        break entry;
                    },
                }
            }
            self.expire_key(&key);
        };

        #[cfg(feature = "metrics")]
        self.metrics.record_insert_new();
        self.after_insert(&entry);
        true
    }

    fn insert_entry(&self, entry: CacheEntry<K, V>) -> Arc<CacheEntry<K, V>> {
        let entry = Arc::new(entry);
        let replaced = self
            .items
            .write()
            .insert(entry.key().clone(), Arc::clone(&entry));

        #[cfg(feature = "metrics")]
        {
            if replaced.is_some() {
                self.metrics.record_insert_update();
            } else {
                self.metrics.record_insert_new();
            }
        }
        trace!(table = %self.name, replaced = replaced.is_some(), "entry added");
        drop(replaced);

        self.after_insert(&entry);
        entry
    }

    fn after_insert(&self, entry: &Arc<CacheEntry<K, V>>) {
        if let Some(deadline) = entry.deadline() {
            self.sweeper.schedule(deadline);
        }
        let hooks = self.hooks.read().on_add.clone();
        for hook in hooks {
            hook(entry);
        }
    }

    // -- lookup -----------------------------------------------------------

    /// Returns the value under `key`, renewing its life span.
    ///
    /// On a miss the `on_load` hook, if any, may produce a value; it is
    /// stored with the table's configured
    /// [`load_life_span`](TableConfig::load_life_span).
    pub fn value(&self, key: &K) -> Result<Arc<V>> {
        self.value_with_life_span(key, self.config.load_life_span)
    }

    /// Like [`value`](Self::value), storing a loaded value with `life_span`.
    pub fn value_with_life_span(&self, key: &K, life_span: Duration) -> Result<Arc<V>> {
        let stale = {
            let items = self.items.read();
            match items.get(key) {
                Some(entry) if !entry.is_expiring() && !entry.is_expired_at(Instant::now()) => {
                    entry.keep_alive();
                    #[cfg(feature = "metrics")]
                    self.metrics.record_get_hit();
                    return Ok(Arc::clone(entry.data()));
                },
                Some(_) => true,
                None => false,
            }
        };

        if stale {
            self.expire_key(key);
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_get_miss();

        let Some(loader) = self.hooks.read().on_load.clone() else {
            trace!(table = %self.name, "cache miss");
            return Err(CacheError::NotFound);
        };
        let Some(data) = loader(key) else {
            trace!(table = %self.name, "cache miss, loader produced nothing");
            return Err(CacheError::NotFound);
        };

        #[cfg(feature = "metrics")]
        self.metrics.record_load();
        let entry = self.add(key.clone(), life_span, data);
        entry.keep_alive();
        trace!(table = %self.name, "cache miss, value loaded");
        Ok(Arc::clone(entry.data()))
    }

    /// Returns the entry under `key` without renewing it.
    pub fn entry(&self, key: &K) -> Result<Arc<CacheEntry<K, V>>> {
        self.items
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired_at(Instant::now()))
            .cloned()
            .ok_or(CacheError::NotFound)
    }

    /// Returns `true` if `key` is mapped. Does not count as access.
    ///
    /// Like [`count`](Self::count), this includes an entry past its deadline
    /// until expiry detaches it, so it is `true` inside that entry's
    /// about-to-expire callbacks.
    pub fn exists(&self, key: &K) -> bool {
        self.items.read().contains_key(key)
    }

    /// Number of entries currently held, including ones past their deadline
    /// that the sweeper has not reclaimed yet.
    pub fn count(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Visits every entry in unspecified order.
    ///
    /// The visitor sees a snapshot taken under the read lock and runs after
    /// the lock is released, so it may call back into the table.
    pub fn foreach<F>(&self, mut visitor: F)
    where
        F: FnMut(&K, &Arc<CacheEntry<K, V>>),
    {
        for entry in self.collect_entries() {
            visitor(entry.key(), &entry);
        }
    }

    /// Returns up to `count` entries with the highest access counts, most
    /// accessed first.
    pub fn most_accessed(&self, count: usize) -> Vec<Arc<CacheEntry<K, V>>> {
        let mut ranked: Vec<_> = self
            .collect_entries()
            .into_iter()
            .map(|entry| (entry.access_count(), entry))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.truncate(count);
        ranked.into_iter().map(|(_, entry)| entry).collect()
    }

    fn collect_entries(&self) -> Vec<Arc<CacheEntry<K, V>>> {
        self.items.read().values().cloned().collect()
    }

    // -- removal ----------------------------------------------------------

    /// Removes `key` and returns its entry.
    ///
    /// Runs the `on_delete` hooks but never the entry's about-to-expire
    /// callbacks; those are reserved for expiry and flush. An entry already
    /// claimed by an expiry or flush belongs to it, and `NotFound` is
    /// returned.
    pub fn remove(&self, key: &K) -> Result<Arc<CacheEntry<K, V>>> {
        let removed = {
            let mut items = self.items.write();
            match items.get(key) {
                Some(entry) if !entry.is_expiring() => items.remove(key),
                _ => None,
            }
        }
        .ok_or(CacheError::NotFound)?;
        #[cfg(feature = "metrics")]
        self.metrics.record_remove();
        debug!(
            table = %self.name,
            access_count = removed.access_count(),
            "removing entry"
        );
        self.notify_deleted(&removed);
        Ok(removed)
    }

    /// Removes every entry, running each one's about-to-expire callbacks
    /// before it is detached and the `on_delete` hooks after, exactly once.
    /// Returns the number removed.
    ///
    /// Entries already claimed by a running expiry are left to it.
    pub fn flush(&self) -> usize {
        let claimed: Vec<_> = self
            .items
            .read()
            .iter()
            .filter(|(_, entry)| entry.begin_expiry())
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect();
        debug!(table = %self.name, count = claimed.len(), "flushing cache table");
        let flushed = self.expire_claimed(claimed);
        #[cfg(feature = "metrics")]
        self.metrics.record_flush(flushed.len() as u64);
        flushed.len()
    }

    // -- expiry -----------------------------------------------------------

    /// Runs one expiry pass on the calling thread. Returns how many entries
    /// were expired.
    pub fn expire_now(&self) -> usize {
        let (expired, next) = self.expire_due();
        if let Some(next) = next {
            self.sweeper.schedule(next);
        }
        expired
    }

    /// Expires `key` if it is past its deadline and nobody claimed it yet.
    fn expire_key(&self, key: &K) -> bool {
        let claimed = {
            let items = self.items.read();
            match items.get(key) {
                Some(entry) if entry.is_expired_at(Instant::now()) && entry.begin_expiry() => {
                    vec![(key.clone(), Arc::clone(entry))]
                },
                _ => return false,
            }
        };
        let expired = self.expire_claimed(claimed);
        if expired.is_empty() {
            return false;
        }
        #[cfg(feature = "metrics")]
        self.metrics.record_expired(1);
        debug!(table = %self.name, "entry expired on read");
        true
    }

    /// Expires every due entry and returns `(expired, next_deadline)`.
    fn expire_due(&self) -> (usize, Option<Instant>) {
        let now = Instant::now();
        let mut next = None;
        let claimed: Vec<(K, Arc<CacheEntry<K, V>>)> = {
            let items = self.items.read();
            let mut due = Vec::new();
            for (key, entry) in items.iter() {
                match entry.deadline() {
                    Some(deadline) if deadline < now => {
                        if entry.begin_expiry() {
                            due.push((key.clone(), Arc::clone(entry)));
                        }
                    },
                    Some(deadline) => next = earliest(next, deadline),
                    None => {},
                }
            }
            due
        };

        #[cfg(feature = "metrics")]
        self.metrics.record_sweep();
        let expired = self.expire_claimed(claimed);
        if !expired.is_empty() {
            debug!(table = %self.name, count = expired.len(), "expired entries");
            #[cfg(feature = "metrics")]
            self.metrics.record_expired(expired.len() as u64);
        }
        (expired.len(), next)
    }

    /// Notifies and detaches entries this caller claimed with
    /// `begin_expiry`. Returns the ones actually detached.
    ///
    /// About-to-expire callbacks run while each entry is still mapped.
    /// Detaching then requires the exact claimed entry under its key; a
    /// replacement added in the meantime is left alone.
    fn expire_claimed(&self, claimed: Vec<(K, Arc<CacheEntry<K, V>>)>) -> Vec<Arc<CacheEntry<K, V>>> {
        if claimed.is_empty() {
            return Vec::new();
        }
        for (_, entry) in &claimed {
            entry.notify_about_to_expire();
        }

        let detached: Vec<_> = {
            let mut items = self.items.write();
            claimed
                .into_iter()
                .filter_map(|(key, entry)| {
                    let mapped = items
                        .get(&key)
                        .is_some_and(|current| Arc::ptr_eq(current, &entry));
                    if mapped { items.remove(&key) } else { None }
                })
                .collect()
        };

        for entry in &detached {
            self.notify_deleted(entry);
        }
        detached
    }

    fn notify_deleted(&self, entry: &CacheEntry<K, V>) {
        let hooks = self.hooks.read().on_delete.clone();
        for hook in hooks {
            hook(entry);
        }
    }

    // -- hooks ------------------------------------------------------------

    /// Installs the loader used on misses, replacing any previous one.
    pub fn set_on_load<F>(&self, loader: F)
    where
        F: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.hooks.write().on_load = Some(Arc::new(loader));
    }

    pub fn clear_on_load(&self) {
        self.hooks.write().on_load = None;
    }

    /// Replaces all `on_add` hooks with `hook`.
    pub fn set_on_add<F>(&self, hook: F)
    where
        F: Fn(&CacheEntry<K, V>) + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write();
        hooks.on_add.clear();
        hooks.on_add.push(Arc::new(hook));
    }

    /// Appends an `on_add` hook.
    pub fn add_on_add<F>(&self, hook: F)
    where
        F: Fn(&CacheEntry<K, V>) + Send + Sync + 'static,
    {
        self.hooks.write().on_add.push(Arc::new(hook));
    }

    pub fn remove_on_add(&self) {
        self.hooks.write().on_add.clear();
    }

    /// Replaces all `on_delete` hooks with `hook`.
    pub fn set_on_delete<F>(&self, hook: F)
    where
        F: Fn(&CacheEntry<K, V>) + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write();
        hooks.on_delete.clear();
        hooks.on_delete.push(Arc::new(hook));
    }

    /// Appends an `on_delete` hook.
    pub fn add_on_delete<F>(&self, hook: F)
    where
        F: Fn(&CacheEntry<K, V>) + Send + Sync + 'static,
    {
        self.hooks.write().on_delete.push(Arc::new(hook));
    }

    pub fn remove_on_delete(&self) {
        self.hooks.write().on_delete.clear();
    }
}

fn earliest(current: Option<Instant>, candidate: Instant) -> Option<Instant> {
    Some(current.map_or(candidate, |current| current.min(candidate)))
}

impl<K, V> Sweep for CacheTable<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn sweep(&self) -> Option<Instant> {
        self.expire_due().1
    }
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsSnapshotProvider<TableMetricsSnapshot> for CacheTable<K, V> {
    fn snapshot(&self) -> TableMetricsSnapshot {
        self.metrics.snapshot(self.items.read().len())
    }
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsReset for CacheTable<K, V> {
    fn reset_metrics(&self) {
        self.metrics.reset();
    }
}

impl<K, V> fmt::Debug for CacheTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheTable")
            .field("name", &self.name)
            .field("len", &self.items.read().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K, V> Drop for CacheTable<K, V> {
    fn drop(&mut self) {
        debug!(table = %self.name, "dropping cache table");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;
    use crate::config::SweepStrategy;

    fn manual_table() -> Arc<CacheTable<String, String>> {
        CacheTable::new("unit", TableConfig::new().with_sweep(SweepStrategy::Manual))
    }

    fn counter_callback(counter: &Arc<AtomicUsize>) -> ExpireCallback<String> {
        let counter = counter.clone();
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    // ==============================================
    // Basic operations
    // ==============================================

    #[test]
    fn add_then_value() {
        let table = manual_table();
        table.add("k".into(), Duration::from_secs(10), "v1".into());
        assert_eq!(*table.value(&"k".into()).unwrap(), "v1");
        assert_eq!(table.entry(&"k".into()).unwrap().access_count(), 1);
        assert_eq!(table.count(), 1);
        assert!(!table.is_empty());
    }

    #[test]
    fn missing_key_is_not_found() {
        let table = manual_table();
        assert_eq!(table.value(&"nope".into()), Err(CacheError::NotFound));
        assert!(matches!(table.entry(&"nope".into()), Err(CacheError::NotFound)));
        assert!(matches!(table.remove(&"nope".into()), Err(CacheError::NotFound)));
        assert!(!table.exists(&"nope".into()));
    }

    #[test]
    fn exists_does_not_touch_statistics() {
        let table = manual_table();
        let entry = table.add("k".into(), Duration::from_secs(10), "v".into());
        assert!(table.exists(&"k".into()));
        assert!(table.exists(&"k".into()));
        assert_eq!(entry.access_count(), 0);
        assert_eq!(entry.accessed_on(), entry.created_on());
    }

    #[test]
    fn add_replaces_without_expire_callback() {
        let table = manual_table();
        let fired = Arc::new(AtomicUsize::new(0));
        let old = table.add_with_callback(
            "k".into(),
            Duration::from_secs(10),
            "old".into(),
            counter_callback(&fired),
        );
        old.keep_alive();

        let new = table.add("k".into(), Duration::from_secs(10), "new".into());
        assert_eq!(*table.value(&"k".into()).unwrap(), "new");
        assert_eq!(new.access_count(), 1);
        assert!(new.created_on() >= old.created_on());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn add_if_absent_keeps_existing() {
        let table = manual_table();
        assert!(table.add_if_absent("k".into(), Duration::ZERO, "first".into()));
        assert!(!table.add_if_absent("k".into(), Duration::ZERO, "second".into()));
        assert_eq!(*table.value(&"k".into()).unwrap(), "first");
    }

    #[test]
    fn add_if_absent_replaces_expired_entry() {
        let table = manual_table();
        let fired = Arc::new(AtomicUsize::new(0));
        table.add_with_callback(
            "k".into(),
            Duration::from_millis(5),
            "stale".into(),
            counter_callback(&fired),
        );
        thread::sleep(Duration::from_millis(15));
        assert!(table.add_if_absent("k".into(), Duration::ZERO, "fresh".into()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(*table.value(&"k".into()).unwrap(), "fresh");
    }

    #[test]
    fn remove_skips_expire_callback_but_runs_on_delete() {
        let table = manual_table();
        let fired = Arc::new(AtomicUsize::new(0));
        let deleted = Arc::new(AtomicUsize::new(0));
        let d = deleted.clone();
        table.set_on_delete(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });
        table.add_with_callback(
            "k".into(),
            Duration::from_secs(10),
            "v".into(),
            counter_callback(&fired),
        );

        let removed = table.remove(&"k".into()).unwrap();
        assert_eq!(**removed.data(), "v");
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(deleted.load(Ordering::SeqCst), 1);
        assert!(!table.exists(&"k".into()));
    }

    // ==============================================
    // Expiry
    // ==============================================

    #[test]
    fn expire_now_removes_due_entries_once() {
        let table = manual_table();
        let fired = Arc::new(AtomicUsize::new(0));
        table.add_with_callback(
            "short".into(),
            Duration::from_millis(5),
            "v".into(),
            counter_callback(&fired),
        );
        table.add("forever".into(), Duration::ZERO, "v".into());
        table.add("long".into(), Duration::from_secs(60), "v".into());

        thread::sleep(Duration::from_millis(15));
        assert_eq!(table.expire_now(), 1);
        assert_eq!(table.expire_now(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(table.count(), 2);
        assert!(table.exists(&"forever".into()));
    }

    #[test]
    fn value_expires_stale_entry_on_read() {
        let table = manual_table();
        let fired = Arc::new(AtomicUsize::new(0));
        table.add_with_callback(
            "k".into(),
            Duration::from_millis(5),
            "v".into(),
            counter_callback(&fired),
        );
        thread::sleep(Duration::from_millis(15));

        assert!(table.exists(&"k".into()));
        assert!(matches!(table.entry(&"k".into()), Err(CacheError::NotFound)));
        assert_eq!(table.value(&"k".into()), Err(CacheError::NotFound));
        assert_eq!(table.value(&"k".into()), Err(CacheError::NotFound));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(table.count(), 0);
        assert!(!table.exists(&"k".into()));
    }

    #[test]
    fn expire_callback_runs_while_entry_is_mapped() {
        let table = manual_table();
        let weak = Arc::downgrade(&table);
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let s = seen.clone();
        table.add_with_callback(
            "k".into(),
            Duration::from_millis(1),
            "v".into(),
            Arc::new(move |key: &String| {
                if let Some(table) = weak.upgrade() {
                    *s.lock() = Some((table.count(), table.exists(key)));
                }
            }),
        );
        thread::sleep(Duration::from_millis(10));
        assert_eq!(table.expire_now(), 1);
        assert_eq!(*seen.lock(), Some((1, true)));
        assert!(!table.exists(&"k".into()));
    }

    #[test]
    fn expire_callback_may_reenter_table() {
        let table = manual_table();
        let weak = Arc::downgrade(&table);
        let inside = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let i = inside.clone();
        table.add_with_callback(
            "k".into(),
            Duration::from_millis(1),
            "v".into(),
            Arc::new(move |key: &String| {
                if let Some(table) = weak.upgrade() {
                    // Claimed entries are neither readable nor removable.
                    i.lock().push(table.value(key).is_err());
                    i.lock().push(table.remove(key).is_err());
                    table.add(format!("{key}-tombstone"), Duration::ZERO, "gone".into());
                }
            }),
        );
        thread::sleep(Duration::from_millis(10));
        assert_eq!(table.expire_now(), 1);
        assert_eq!(*inside.lock(), vec![true, true]);
        assert!(table.exists(&"k-tombstone".into()));
        assert!(!table.exists(&"k".into()));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn replacement_added_by_expire_callback_survives() {
        let table = manual_table();
        let weak = Arc::downgrade(&table);
        table.add_with_callback(
            "k".into(),
            Duration::from_millis(1),
            "old".into(),
            Arc::new(move |key: &String| {
                if let Some(table) = weak.upgrade() {
                    table.add(key.clone(), Duration::ZERO, "new".into());
                }
            }),
        );
        thread::sleep(Duration::from_millis(10));
        assert_eq!(table.expire_now(), 0);
        assert_eq!(*table.value(&"k".into()).unwrap(), "new");
    }

    // ==============================================
    // Flush / iteration
    // ==============================================

    #[test]
    fn flush_fires_each_callback_once() {
        let table = manual_table();
        let counters: Vec<_> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        for (i, counter) in counters.iter().enumerate() {
            table.add_with_callback(
                format!("k{i}"),
                Duration::from_secs(60),
                "v".into(),
                counter_callback(counter),
            );
        }
        assert_eq!(table.flush(), 5);
        assert_eq!(table.count(), 0);
        assert!(counters.iter().all(|c| c.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn flush_notifies_before_detaching() {
        let table = manual_table();
        let weak = Arc::downgrade(&table);
        let counts = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..3 {
            let weak = weak.clone();
            let counts = counts.clone();
            table.add_with_callback(
                format!("k{i}"),
                Duration::from_secs(60),
                "v".into(),
                Arc::new(move |_| {
                    if let Some(table) = weak.upgrade() {
                        counts.lock().push(table.count());
                    }
                }),
            );
        }
        assert_eq!(table.flush(), 3);
        assert_eq!(*counts.lock(), vec![3, 3, 3]);
        assert!(table.is_empty());
    }

    #[test]
    fn foreach_visits_all_entries() {
        let table = manual_table();
        for i in 0..4 {
            table.add(format!("k{i}"), Duration::ZERO, format!("v{i}"));
        }
        let mut keys = Vec::new();
        table.foreach(|key, entry| {
            assert_eq!(entry.key(), key);
            keys.push(key.clone());
        });
        keys.sort();
        assert_eq!(keys, vec!["k0", "k1", "k2", "k3"]);
    }

    #[test]
    fn foreach_visitor_may_write_table() {
        let table = manual_table();
        table.add("a".into(), Duration::ZERO, "1".into());
        table.foreach(|key, _| {
            table.remove(key).unwrap();
        });
        assert!(table.is_empty());
    }

    #[test]
    fn most_accessed_orders_by_count() {
        let table = manual_table();
        for (key, hits) in [("a", 1), ("b", 3), ("c", 2)] {
            table.add(key.into(), Duration::ZERO, key.into());
            for _ in 0..hits {
                table.value(&key.into()).unwrap();
            }
        }
        let top: Vec<_> = table
            .most_accessed(2)
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        assert_eq!(top, vec!["b", "c"]);
        assert_eq!(table.most_accessed(10).len(), 3);
    }

    // ==============================================
    // Hooks
    // ==============================================

    #[test]
    fn loader_fills_misses() {
        let table = manual_table();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        table.set_on_load(move |key: &String| {
            c.fetch_add(1, Ordering::SeqCst);
            (key != "missing").then(|| key.to_uppercase())
        });

        assert_eq!(*table.value(&"abc".into()).unwrap(), "ABC");
        assert_eq!(*table.value(&"abc".into()).unwrap(), "ABC");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.entry(&"abc".into()).unwrap().access_count(), 2);

        assert_eq!(table.value(&"missing".into()), Err(CacheError::NotFound));
        assert!(!table.exists(&"missing".into()));

        table.clear_on_load();
        assert_eq!(table.value(&"other".into()), Err(CacheError::NotFound));
    }

    #[test]
    fn loaded_entries_use_requested_life_span() {
        let table: Arc<CacheTable<String, String>> = CacheTable::new(
            "loader-ttl",
            TableConfig::new()
                .with_sweep(SweepStrategy::Manual)
                .with_load_life_span(Duration::from_secs(5)),
        );
        table.set_on_load(|key: &String| Some(key.clone()));

        table.value(&"default".into()).unwrap();
        table
            .value_with_life_span(&"custom".into(), Duration::from_millis(7))
            .unwrap();
        assert_eq!(
            table.entry(&"default".into()).unwrap().life_span(),
            Duration::from_secs(5)
        );
        assert_eq!(
            table.entry(&"custom".into()).unwrap().life_span(),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn on_add_hooks_can_be_stacked_and_cleared() {
        let table = manual_table();
        let added = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let a = added.clone();
            table.add_on_add(move |_| {
                a.fetch_add(1, Ordering::SeqCst);
            });
        }
        table.add("k".into(), Duration::ZERO, "v".into());
        assert_eq!(added.load(Ordering::SeqCst), 2);

        let a = added.clone();
        table.set_on_add(move |_| {
            a.fetch_add(10, Ordering::SeqCst);
        });
        table.add("k2".into(), Duration::ZERO, "v".into());
        assert_eq!(added.load(Ordering::SeqCst), 12);

        table.remove_on_add();
        table.add("k3".into(), Duration::ZERO, "v".into());
        assert_eq!(added.load(Ordering::SeqCst), 12);
    }

    #[test]
    fn on_add_hook_sees_entry_and_may_reenter() {
        let table = manual_table();
        let weak = Arc::downgrade(&table);
        table.set_on_add(move |entry| {
            if let Some(table) = weak.upgrade() {
                assert!(table.exists(entry.key()));
            }
        });
        table.add("k".into(), Duration::ZERO, "v".into());
    }

    #[test]
    fn expiry_runs_on_delete_hooks() {
        let table = manual_table();
        let deleted = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let d = deleted.clone();
        table.add_on_delete(move |entry| d.lock().push(entry.key().clone()));
        table.remove_on_delete();
        let d = deleted.clone();
        table.add_on_delete(move |entry| d.lock().push(entry.key().clone()));

        table.add("k".into(), Duration::from_millis(1), "v".into());
        thread::sleep(Duration::from_millis(10));
        table.expire_now();
        assert_eq!(*deleted.lock(), vec!["k".to_string()]);
    }

    // ==============================================
    // Background sweeping
    // ==============================================

    #[test]
    fn adaptive_sweeper_expires_without_access() {
        let table: Arc<CacheTable<u32, u32>> = CacheTable::new("adaptive", TableConfig::default());
        assert!(table.is_sweeping());
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        table.add_with_callback(
            1,
            Duration::from_millis(20),
            1,
            Arc::new(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let until = Instant::now() + Duration::from_secs(2);
        while (table.count() > 0 || fired.load(Ordering::SeqCst) == 0) && Instant::now() < until {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(table.count(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_table_stops_sweeper() {
        let table: Arc<CacheTable<u32, u32>> = CacheTable::new(
            "drop",
            TableConfig::new().with_sweep(SweepStrategy::Interval(Duration::from_millis(1))),
        );
        table.add(1, Duration::from_millis(1), 1);
        thread::sleep(Duration::from_millis(10));
        drop(table);
    }

    #[test]
    fn debug_output_names_table() {
        let table = manual_table();
        let rendered = format!("{table:?}");
        assert!(rendered.contains("unit"));
    }
}
