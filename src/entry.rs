//! A single keyed value with sliding-expiration metadata.
//!
//! ## Architecture
//!
//! ```text
//!   CacheEntry<K, V>
//!   ┌────────────────────────────────────────────────────────────┐
//!   │  immutable after construction (no locking)                 │
//!   │    key: K          data: Arc<V>                            │
//!   │    life_span       created_on                              │
//!   │  expiring: AtomicBool  (set once, by the expiry that owns it) │
//!   ├────────────────────────────────────────────────────────────┤
//!   │  RwLock<EntryState>                                        │
//!   │    accessed_on     access_count                            │
//!   │    about_to_expire: Vec<ExpireCallback<K>>                 │
//!   └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The entry lock is independent of the owning table's lock, so renewing one
//! entry never blocks operations on another.
//!
//! ## Expiration Rule
//!
//! An entry with a non-zero life span is expired once
//! `accessed_on + life_span < now`. A zero life span never expires.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cachetable::entry::CacheEntry;
//!
//! let entry = CacheEntry::new("session", Duration::from_secs(30), 42u32);
//! assert_eq!(entry.access_count(), 0);
//!
//! entry.keep_alive();
//! assert_eq!(entry.access_count(), 1);
//! assert!(entry.accessed_on() >= entry.created_on());
//!
//! entry.set_about_to_expire_callback(Some(Arc::new(|key: &&str| {
//!     println!("{key} is about to expire");
//! })));
//! assert_eq!(entry.about_to_expire_callback_count(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! `CacheEntry` is `Send + Sync` when `K` and `V` are. `keep_alive` and the
//! callback setters take the exclusive lock; `accessed_on`/`access_count`
//! take the shared lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Callback invoked with the entry's key right before timer-driven expiry
/// (or a flush) removes it.
pub type ExpireCallback<K> = Arc<dyn Fn(&K) + Send + Sync>;

struct EntryState<K> {
    accessed_on: Instant,
    access_count: u64,
    about_to_expire: Vec<ExpireCallback<K>>,
}

/// A cached value together with its TTL bookkeeping.
pub struct CacheEntry<K, V> {
    key: K,
    data: Arc<V>,
    life_span: Duration,
    created_on: Instant,
    state: RwLock<EntryState<K>>,
    expiring: AtomicBool,
}

impl<K, V> CacheEntry<K, V> {
    /// Creates an entry stamped with the current time and no callbacks.
    pub fn new(key: K, life_span: Duration, data: V) -> Self {
        Self::with_shared(key, life_span, Arc::new(data))
    }

    /// Creates an entry around an already shared value.
    pub fn with_shared(key: K, life_span: Duration, data: Arc<V>) -> Self {
        let now = Instant::now();
        Self {
            key,
            data,
            life_span,
            created_on: now,
            state: RwLock::new(EntryState {
                accessed_on: now,
                access_count: 0,
                about_to_expire: Vec::new(),
            }),
            expiring: AtomicBool::new(false),
        }
    }

    /// Marks the entry as used: resets the expiration clock and bumps the
    /// access counter.
    pub fn keep_alive(&self) {
        let now = Instant::now();
        let mut state = self.state.write();
        // The clock is read before the lock, so a writer that got the lock
        // later may carry an earlier instant.
        state.accessed_on = state.accessed_on.max(now);
        state.access_count += 1;
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn data(&self) -> &Arc<V> {
        &self.data
    }

    /// Inactivity period after which the entry expires. Zero means never.
    #[inline]
    pub fn life_span(&self) -> Duration {
        self.life_span
    }

    #[inline]
    pub fn created_on(&self) -> Instant {
        self.created_on
    }

    /// Last keep-alive time (equal to `created_on` until the first access).
    pub fn accessed_on(&self) -> Instant {
        self.state.read().accessed_on
    }

    /// Number of keep-alives since creation.
    pub fn access_count(&self) -> u64 {
        self.state.read().access_count
    }

    /// Returns `true` if the entry takes part in expiration.
    #[inline]
    pub fn expires(&self) -> bool {
        !self.life_span.is_zero()
    }

    /// Instant at which the entry becomes eligible for expiry, or `None` for
    /// entries that never expire. A life span too large to represent as an
    /// `Instant` also yields `None`.
    pub fn deadline(&self) -> Option<Instant> {
        if !self.expires() {
            return None;
        }
        self.state.read().accessed_on.checked_add(self.life_span)
    }

    /// Returns `true` if the entry's deadline lies strictly before `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| deadline < now)
    }

    /// Replaces all about-to-expire callbacks. `None` clears them.
    pub fn set_about_to_expire_callback(&self, callback: Option<ExpireCallback<K>>) {
        let mut state = self.state.write();
        state.about_to_expire.clear();
        state.about_to_expire.extend(callback);
    }

    /// Appends an about-to-expire callback to the ones already registered.
    pub fn add_about_to_expire_callback(&self, callback: ExpireCallback<K>) {
        self.state.write().about_to_expire.push(callback);
    }

    /// Drops every about-to-expire callback.
    pub fn remove_about_to_expire_callbacks(&self) {
        self.state.write().about_to_expire.clear();
    }

    pub fn about_to_expire_callback_count(&self) -> usize {
        self.state.read().about_to_expire.len()
    }

    /// Marks the entry as picked for expiry. Returns `true` for the first
    /// caller only; that caller owns notification and removal.
    pub(crate) fn begin_expiry(&self) -> bool {
        self.expiring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Returns `true` once an expiry or flush has picked this entry.
    pub fn is_expiring(&self) -> bool {
        self.expiring.load(Ordering::Acquire)
    }

    /// Runs the registered about-to-expire callbacks.
    ///
    /// The callback list is snapshotted under the shared lock and invoked
    /// after it is released, so a callback may touch this entry freely.
    pub(crate) fn notify_about_to_expire(&self) {
        let callbacks = self.state.read().about_to_expire.clone();
        for callback in callbacks {
            callback(&self.key);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("data", &self.data)
            .field("life_span", &self.life_span)
            .field("created_on", &self.created_on)
            .field("accessed_on", &state.accessed_on)
            .field("access_count", &state.access_count)
            .field("about_to_expire", &state.about_to_expire.len())
            .field("expiring", &self.is_expiring())
            .finish()
    }
}
