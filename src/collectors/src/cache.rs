//! A single-writer/multi-reader cache with a fixed freshness window.
//!
//! Per the Design Notes' *Global per-process caches* flag: this is an
//! explicit field on the collector that owns it, not a module-level static,
//! so tests can construct independent collectors with independent caches.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;

pub struct FreshnessCache<T: Clone> {
    ttl: Duration,
    slot: RwLock<Option<(Instant, T)>>,
}

impl<T: Clone> FreshnessCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// Return the cached value if it is still within `ttl`. Readers always
    /// see either the previous complete value or `None` — never a partial
    /// write, since the write only happens via `store`.
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref().and_then(|(at, value)| {
            if at.elapsed() < self.ttl {
                Some(value.clone())
            } else {
                None
            }
        })
    }

    pub async fn store(&self, value: T) {
        let mut slot = self.slot.write().await;
        *slot = Some((Instant::now(), value));
    }
}
