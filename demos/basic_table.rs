//! Walkthrough of registry, sliding expiration and lifecycle hooks.
//!
//! Run with: cargo run --example basic_table

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cachetable::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    println!("=== cachetable walkthrough ===\n");

    let registry: TableRegistry<String, String> = TableRegistry::new();
    let sessions = registry.cache("sessions");

    // 1. Sliding expiration
    println!("1. Sliding expiration");
    sessions.add_with_callback(
        "alice".into(),
        Duration::from_millis(100),
        "token-a".into(),
        Arc::new(|key: &String| println!("   {key} is about to expire")),
    );
    for _ in 0..3 {
        thread::sleep(Duration::from_millis(60));
        let token = sessions.value(&"alice".into());
        println!("   alice after 60ms: {:?}", token.as_deref());
    }
    thread::sleep(Duration::from_millis(200));
    println!("   alice after idling: {:?}", sessions.value(&"alice".into()));
    println!();

    // 2. Loader on miss
    println!("2. Loader on miss");
    sessions.set_on_load(|key: &String| Some(format!("generated-for-{key}")));
    println!("   bob: {:?}", sessions.value(&"bob".into()).as_deref());
    println!("   count: {}", sessions.count());
    println!();

    // 3. Explicit removal vs. flush
    println!("3. Removal vs. flush");
    sessions.set_on_delete(|entry| println!("   on_delete: {}", entry.key()));
    sessions.add_with_callback(
        "carol".into(),
        Duration::ZERO,
        "token-c".into(),
        Arc::new(|key: &String| println!("   about-to-expire: {key}")),
    );
    let _ = sessions.remove(&"carol".into());
    sessions.add_with_callback(
        "dave".into(),
        Duration::ZERO,
        "token-d".into(),
        Arc::new(|key: &String| println!("   about-to-expire: {key}")),
    );
    println!("   flushed {} entries", sessions.flush());
    println!();

    // 4. Same name, same table
    println!("4. Registry");
    let again = registry.cache("sessions");
    println!("   same instance: {}", Arc::ptr_eq(&sessions, &again));
}
