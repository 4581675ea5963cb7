//! Bounded, time-expiring cache of verified leaf public keys.
//!
//! Entries are keyed by the fingerprint of the exact `(leaf, intermediate)`
//! certificate bytes, so a hit means the same chain already passed full
//! validation. Only successful validations are inserted.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use p256::ecdsa::VerifyingKey;
use tokio::sync::Mutex;

use crate::clock::Clock;

/// Maximum number of live entries.
pub const MAX_CACHE_SIZE: usize = 32;

/// Lifetime of a cached key (15 minutes).
pub const CACHE_TTL_SECS: i64 = 15 * 60;

/// A cached public key.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Leaf public key from a validated chain.
    pub public_key: VerifyingKey,

    /// When the entry stops being served.
    pub expires_at: DateTime<Utc>,
}

/// Public-key cache shared by all verifications of one verifier.
#[derive(Debug, Clone)]
pub struct PublicKeyCache {
    inner: Arc<Mutex<CacheInner>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    ttl: Duration,
}

#[derive(Debug, Default)]
struct CacheInner {
    /// Fingerprint -> entry
    entries: HashMap<String, CacheEntry>,

    /// Insertion order, oldest first
    order: VecDeque<String>,
}

impl PublicKeyCache {
    /// Create a cache with the default capacity and TTL.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(clock, MAX_CACHE_SIZE, Duration::seconds(CACHE_TTL_SECS))
    }

    /// Create a cache with explicit limits.
    pub fn with_limits(clock: Arc<dyn Clock>, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            clock,
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Look up a live entry. Expired entries are dropped on access.
    pub async fn get(&self, fingerprint: &str) -> Option<VerifyingKey> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().await;

        match inner.entries.get(fingerprint) {
            Some(entry) if entry.expires_at > now => return Some(entry.public_key.clone()),
            Some(_) => {}
            None => return None,
        }

        inner.remove(fingerprint);
        None
    }

    /// Insert a key for a freshly validated chain.
    pub async fn insert(&self, fingerprint: String, public_key: VerifyingKey) {
        let now = self.clock.now();
        let entry = CacheEntry {
            public_key,
            expires_at: now + self.ttl,
        };

        let mut inner = self.inner.lock().await;

        // Replace in place; a re-validated chain moves to the back.
        if inner.entries.contains_key(&fingerprint) {
            inner.remove(&fingerprint);
        }

        inner.purge_expired(now);

        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        inner.order.push_back(fingerprint.clone());
        inner.entries.insert(fingerprint, entry);
    }

    /// Number of stored entries, including ones that expired but were not
    /// yet touched.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.order.clear();
    }
}

impl CacheInner {
    fn remove(&mut self, fingerprint: &str) {
        self.entries.remove(fingerprint);
        self.order.retain(|k| k != fingerprint);
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let entries = &mut self.entries;
        self.order.retain(|k| match entries.get(k) {
            Some(entry) if entry.expires_at <= now => {
                entries.remove(k);
                false
            }
            Some(_) => true,
            None => false,
        });
    }
}
