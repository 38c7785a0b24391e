// SPDX-License-Identifier: MIT

//! Subscriber lookups cached by (environment, subscriber id)

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{Subscriber, SubscriberRepository};
use crate::error::FilterError;
use crate::filter::{Clock, SystemClock};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

type CacheKey = (String, String);

#[derive(Clone)]
struct CacheEntry {
    subscriber: Subscriber,
    inserted_at: DateTime<Utc>,
}

/// Read-through cache over a [`SubscriberRepository`].
///
/// Only hits are stored. Entries expire after `ttl` so presence changes
/// become visible, and the map never holds more than `capacity` entries.
/// Two concurrent misses both fetch and the later insert wins.
#[derive(Clone)]
pub struct SubscriberCache {
    repository: Arc<dyn SubscriberRepository>,
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    capacity: usize,
}

impl SubscriberCache {
    pub fn new(repository: Arc<dyn SubscriberRepository>) -> Self {
        Self {
            repository,
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_CACHE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A zero `ttl` disables caching
    pub fn with_limits(mut self, ttl: Duration, capacity: usize) -> Self {
        self.ttl = ttl;
        self.capacity = capacity.max(1);
        self
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // A negative age (clock moved backwards) counts as fresh
        now.signed_duration_since(entry.inserted_at)
            .to_std()
            .map_or(true, |age| age < self.ttl)
    }

    pub async fn get(
        &self,
        environment_id: &str,
        subscriber_id: &str,
    ) -> Result<Option<Subscriber>, FilterError> {
        let key = (environment_id.to_string(), subscriber_id.to_string());
        if let Some(entry) = self.entries.read().await.get(&key) {
            if self.is_fresh(entry, self.clock.now()) {
                return Ok(Some(entry.subscriber.clone()));
            }
        }

        let fetched = self
            .repository
            .find_by_id(environment_id, subscriber_id)
            .await?;

        let mut entries = self.entries.write().await;
        match &fetched {
            Some(subscriber) if !self.ttl.is_zero() => {
                log::debug!(
                    "Caching subscriber {} for environment {}",
                    subscriber_id,
                    environment_id
                );
                let now = self.clock.now();
                if !entries.contains_key(&key) && entries.len() >= self.capacity {
                    self.evict(&mut entries, now);
                }
                entries.insert(
                    key,
                    CacheEntry {
                        subscriber: subscriber.clone(),
                        inserted_at: now,
                    },
                );
            }
            _ => {
                entries.remove(&key);
            }
        }
        Ok(fetched)
    }

    /// Drop expired entries, then the oldest one if the map is still full
    fn evict(&self, entries: &mut HashMap<CacheKey, CacheEntry>, now: DateTime<Utc>) {
        entries.retain(|_, entry| self.is_fresh(entry, now));
        if entries.len() < self.capacity {
            return;
        }
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }

    /// Drop a cached entry, e.g. after the subscriber's presence changed
    pub async fn invalidate(&self, environment_id: &str, subscriber_id: &str) {
        self.entries
            .write()
            .await
            .remove(&(environment_id.to_string(), subscriber_id.to_string()));
    }
}
