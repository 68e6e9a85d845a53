//! cachetable: named in-process key/value tables with sliding expiration.
//!
//! A [`TableRegistry`](registry::TableRegistry) hands out one shared
//! [`CacheTable`](table::CacheTable) per name. Each table stores
//! [`CacheEntry`](entry::CacheEntry) values that expire after a period of
//! inactivity, renews them on every read, and runs user callbacks when
//! entries are added, loaded on a miss, expire, or are deleted.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod config;
pub mod entry;
pub mod error;
pub mod registry;
pub mod table;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;

mod sweep;
