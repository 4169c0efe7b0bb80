use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use pgtid_config::shared::MarkerCacheConfig;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::source::ServerKey;
use crate::types::Position;

type CacheKey = (ServerKey, String);

/// Cached marker position with its insertion time.
#[derive(Debug)]
struct CachedPosition {
    position: Position,
    inserted_at: Instant,
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<HashMap<CacheKey, CachedPosition>>,
    ttl: Duration,
}

impl Inner {
    async fn sweep(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.inserted_at.elapsed() < self.ttl);

        before - entries.len()
    }
}

/// Time-bounded lookup cache of marker positions, keyed by server and marker text.
///
/// Clones share the same entries. Entries expire `ttl` after insertion and are never returned
/// once expired; [`MarkerCache::spawn_sweeper`] reclaims their memory periodically. Concurrent
/// inserts of the same key are allowed and the last one wins.
#[derive(Debug, Clone)]
pub struct MarkerCache {
    inner: Arc<Inner>,
    sweep_interval: Duration,
}

impl MarkerCache {
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                ttl,
            }),
            sweep_interval,
        }
    }

    /// Creates a cache from its configuration.
    pub fn from_config(config: &MarkerCacheConfig) -> Self {
        Self::new(
            Duration::from_secs(config.ttl_secs),
            Duration::from_secs(config.sweep_interval_secs),
        )
    }

    /// Returns the cached position of `text` on `server`, if present and not expired.
    pub async fn get(&self, server: &ServerKey, text: &str) -> Option<Position> {
        let entries = self.inner.entries.read().await;
        let cached = entries.get(&(server.clone(), text.to_string()))?;

        if cached.inserted_at.elapsed() >= self.inner.ttl {
            return None;
        }

        Some(cached.position.clone())
    }

    /// Caches the position of `text` on `server`, replacing any previous entry.
    pub async fn insert(&self, server: &ServerKey, text: &str, position: Position) {
        let mut entries = self.inner.entries.write().await;
        entries.insert(
            (server.clone(), text.to_string()),
            CachedPosition {
                position,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Removes expired entries and returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        self.inner.sweep().await
    }

    /// Returns the number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Starts a background task removing expired entries every sweep interval.
    ///
    /// The task only holds a weak reference and ends once every clone of the cache is dropped.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let sweep_interval = self.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;

                let Some(inner) = inner.upgrade() else {
                    debug!("marker cache dropped, stopping sweeper");
                    break;
                };

                let removed = inner.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired marker cache entries");
                }
            }
        })
    }
}

impl Default for MarkerCache {
    fn default() -> Self {
        Self::from_config(&MarkerCacheConfig::default())
    }
}
