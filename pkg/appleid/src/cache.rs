//! Cache of identities resolved from verified tokens.
//!
//! A hit skips the key fetch and signature check entirely, so entries must
//! not outlive the token's acceptance window. Entries are keyed by the
//! SHA-256 digest of the token; the bearer token itself is never stored.
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::clock::{Now, SystemNow};
use crate::models::IdentityRecord;

const DEFAULT_CAPACITY: usize = 10_000;

type TokenDigest = [u8; 32];

/// Storage for identities of already verified tokens.
pub trait TokenCache: Send + Sync + 'static {
    /// Returns the identity cached for a token, unless it expired.
    fn get(&self, token: &str) -> Option<IdentityRecord>;

    /// Caches an identity. `None` keeps it until evicted.
    fn put(&self, token: &str, record: IdentityRecord, ttl: Option<Duration>);
}

#[derive(Debug, Clone)]
struct Entry {
    record: IdentityRecord,
    expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Process-local [`TokenCache`] bounded to a number of entries.
///
/// Expired entries are dropped lazily on lookup and when the cache is
/// full. A full cache without expired entries evicts the entry closest
/// to expiring.
#[derive(Debug)]
pub struct InMemoryTokenCache<N = SystemNow> {
    entries: RwLock<HashMap<TokenDigest, Entry>>,
    capacity: usize,
    _now: PhantomData<N>,
}

impl InMemoryTokenCache<SystemNow> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::bounded(capacity)
    }
}

impl Default for InMemoryTokenCache<SystemNow> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> InMemoryTokenCache<N> {
    pub(crate) fn bounded(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            _now: PhantomData,
        }
    }

    /// Number of entries, including expired ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N: Now> TokenCache for InMemoryTokenCache<N> {
    fn get(&self, token: &str) -> Option<IdentityRecord> {
        let key = digest(token);
        let now = N::now();

        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(&key) {
                None => return None,
                Some(entry) if !entry.is_expired(now) => return Some(entry.record.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(&key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(&key);
            debug!("dropped expired token cache entry");
        }
        None
    }

    fn put(&self, token: &str, record: IdentityRecord, ttl: Option<Duration>) {
        let key = digest(token);
        let now = N::now();
        let expires_at = ttl.map(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            entries.retain(|_, entry| !entry.is_expired(now));
        }
        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let soonest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at.unwrap_or(DateTime::<Utc>::MAX_UTC))
                .map(|(key, _)| *key);
            if let Some(soonest) = soonest {
                entries.remove(&soonest);
                debug!("evicted token cache entry");
            }
        }

        entries.insert(key, Entry { record, expires_at });
    }
}

fn digest(token: &str) -> TokenDigest {
    Sha256::digest(token.as_bytes()).into()
}
