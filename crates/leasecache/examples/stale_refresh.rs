// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Example demonstrating fleet-wide stale handling.
//!
//! Two caches stand in for two processes that share a store and a lease coordinator.
//! A single stale notification reaches both, yet the value is recomputed once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use leasecache::{InMemoryLeases, InMemoryStore, SelfPopulatingCache, StaleNotifier};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let clock = Clock::new_tokio();
    let store = Arc::new(InMemoryStore::<String, String>::new());
    let leases = InMemoryLeases::new(clock.clone());
    let notifier = StaleNotifier::new();
    let computations = Arc::new(AtomicUsize::new(0));

    let mut caches = Vec::new();
    let mut subscriptions = Vec::new();
    for name in ["node-a", "node-b"] {
        let computations = Arc::clone(&computations);
        let cache = SelfPopulatingCache::builder::<String, String>(clock.clone())
            .name(name)
            .store(Arc::clone(&store))
            .leases(leases.clone())
            .lease_expires_in(Duration::from_secs(60))
            .populate_timeout(Duration::from_secs(5))
            .populate(move |key: String| {
                let version = computations.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    // Simulate an expensive upstream call.
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, std::io::Error>(format!("{key} v{version}"))
                }
            })
            .on_error(|error| eprintln!("background repopulation failed: {error}"))
            .build()?;

        subscriptions.push(cache.subscribe(notifier.subscribe()));
        caches.push(cache);
    }

    let key = "report:daily".to_string();
    println!("first read: {}", caches[0].get(&key).await?);

    let delivered = notifier.notify(key.clone());
    println!("stale event delivered to {delivered} caches");

    tokio::time::sleep(Duration::from_millis(500)).await;

    for cache in &caches {
        println!("{} reads: {}", cache.name(), cache.get(&key).await?);
    }
    println!("populate ran {} times", computations.load(Ordering::SeqCst));

    drop(subscriptions);
    Ok(())
}
