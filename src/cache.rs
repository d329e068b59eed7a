//! Time-bounded in-memory cache for API responses.
//!
//! The cache is an explicit object owned by [`crate::Client`]; the clock is
//! injected so expiry can be driven deterministically in tests.

use ahash::AHashMap;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Default freshness window for cached responses.
pub const DEFAULT_TTL_HOURS: i64 = 24;

pub fn default_ttl() -> TimeDelta {
    TimeDelta::hours(DEFAULT_TTL_HOURS)
}

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock. Clones share the same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Query identity. `Display` renders the stable string stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Countries,
    Gdp { code: String, start: i32, end: i32 },
}

impl CacheKey {
    pub fn gdp(code: &str, start: i32, end: i32) -> Self {
        Self::Gdp {
            code: code.trim().to_ascii_uppercase(),
            start,
            end,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Countries => f.write_str("countries"),
            CacheKey::Gdp { code, start, end } => write!(f, "gdp:{code}:{start}:{end}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub data: V,
    pub timestamp: DateTime<Utc>,
}

/// Unbounded map from query key to payload; entries older than `ttl` read as absent.
#[derive(Debug)]
pub struct TtlCache<V, C = SystemClock> {
    entries: AHashMap<String, CacheEntry<V>>,
    ttl: TimeDelta,
    clock: C,
}

impl<V> Default for TtlCache<V, SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock, default_ttl())
    }
}

impl<V, C: Clock> TtlCache<V, C> {
    pub fn new(clock: C, ttl: TimeDelta) -> Self {
        Self {
            entries: AHashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Fresh payload for `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Option<&V> {
        let entry = self.entries.get(&key.to_string())?;
        self.is_fresh(entry).then_some(&entry.data)
    }

    /// Raw entry, stale or not.
    pub fn entry(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(&key.to_string())
    }

    pub fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        self.clock.now() - entry.timestamp < self.ttl
    }

    /// Store `data` under `key`, replacing whatever was there.
    pub fn insert(&mut self, key: &CacheKey, data: V) {
        let key = key.to_string();
        let entry = CacheEntry {
            key: key.clone(),
            data,
            timestamp: self.clock.now(),
        };
        self.entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
