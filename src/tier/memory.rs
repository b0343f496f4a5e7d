//! In-process cache tier: bounded, time-expiring, per-function.
//!
//! One [`MemoryTier`] exists per cached function (see
//! [`registry`](crate::tier::registry)). Entries are keyed by call
//! fingerprint and carry the value's fingerprint-at-write-time for the
//! mutation guard. Capacity overflow evicts the least-recently-used entry;
//! TTL expiry is passive — an expired entry is simply treated as absent
//! (and dropped) when a read touches it. There is no background sweep.
//!
//! Time comes from a [`Clock`] rather than `Instant::now()` directly so
//! that TTL behaviour is testable without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::fingerprint::Digest;

/// Source of monotonic time for TTL checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The default [`Clock`]: `Instant::now()`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A [`Clock`] advanced by hand. For tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("clock lock poisoned")
    }
}

/// A cached value plus its fingerprint at write time.
///
/// `fingerprint` is `None` when the owning function was built with
/// `allow_output_mutation()` — the mutation guard then skips its check.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fingerprint: Option<Digest>,
}

struct Slot<V> {
    entry: CacheEntry<V>,
    written_at: Instant,
}

struct TierInner<V> {
    slots: HashMap<Digest, Slot<V>>,
    /// Recency order, least recently used first.
    order: Vec<Digest>,
}

/// Bounded, time-expiring key-value store for one cached function.
///
/// The interior lock is held only for the structural lookup or mutation,
/// never across a wrapped function's execution.
pub struct MemoryTier<V> {
    max_entries: Option<u64>,
    ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
    inner: Mutex<TierInner<V>>,
}

impl<V: Clone> MemoryTier<V> {
    /// Create an empty tier. `max_entries: None` means unbounded;
    /// `ttl: None` means entries never expire by time.
    pub fn new(max_entries: Option<u64>, ttl: Option<Duration>, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_entries,
            ttl,
            clock,
            inner: Mutex::new(TierInner {
                slots: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Bounds this tier was created with, for the registry's
    /// parameters-changed comparison.
    pub fn params(&self) -> (Option<u64>, Option<Duration>) {
        (self.max_entries, self.ttl)
    }

    /// Look up an entry, refreshing its recency on hit.
    ///
    /// An entry past its TTL is removed and reported absent.
    pub fn get(&self, key: &Digest) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("memory tier lock poisoned");
        let expired = match inner.slots.get(key) {
            None => return None,
            Some(slot) => match self.ttl {
                Some(ttl) => now.duration_since(slot.written_at) >= ttl,
                None => false,
            },
        };
        if expired {
            inner.slots.remove(key);
            inner.order.retain(|k| k != key);
            return None;
        }
        inner.order.retain(|k| k != key);
        inner.order.push(*key);
        inner.slots.get(key).map(|slot| slot.entry.clone())
    }

    /// Insert or replace an entry, evicting the least recently used entry
    /// if the tier is full.
    pub fn insert(&self, key: Digest, entry: CacheEntry<V>) {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("memory tier lock poisoned");
        if inner.slots.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if let Some(max) = self.max_entries {
            while inner.slots.len() as u64 >= max {
                match inner.order.first().copied() {
                    Some(oldest) => {
                        inner.slots.remove(&oldest);
                        inner.order.remove(0);
                    }
                    None => break,
                }
            }
        }
        inner.order.push(key);
        inner.slots.insert(key, Slot { entry, written_at: now });
    }

    /// Number of entries currently stored (including not-yet-touched
    /// expired ones).
    pub fn len(&self) -> usize {
        self.inner.lock().expect("memory tier lock poisoned").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: u32) -> CacheEntry<u32> {
        CacheEntry {
            value: v,
            fingerprint: None,
        }
    }

    fn key(n: u8) -> Digest {
        crate::fingerprint::fingerprint(&n, None).unwrap()
    }

    fn tier(max: Option<u64>, ttl: Option<Duration>) -> (Arc<ManualClock>, MemoryTier<u32>) {
        let clock = Arc::new(ManualClock::new());
        let tier = MemoryTier::new(max, ttl, clock.clone());
        (clock, tier)
    }

    #[test]
    fn insert_then_get() {
        let (_, tier) = tier(None, None);
        tier.insert(key(1), entry(10));
        assert_eq!(tier.get(&key(1)).unwrap().value, 10);
        assert!(tier.get(&key(2)).is_none());
    }

    #[test]
    fn ttl_expiry_is_passive() {
        let (clock, tier) = tier(None, Some(Duration::from_secs(60)));
        tier.insert(key(1), entry(10));
        assert!(tier.get(&key(1)).is_some());

        clock.advance(Duration::from_secs(61));
        assert!(tier.get(&key(1)).is_none());
        assert!(tier.is_empty(), "expired entry dropped on read");
    }

    #[test]
    fn entry_alive_just_under_ttl() {
        let (clock, tier) = tier(None, Some(Duration::from_secs(60)));
        tier.insert(key(1), entry(10));
        clock.advance(Duration::from_secs(59));
        assert!(tier.get(&key(1)).is_some());
    }

    #[test]
    fn overflow_evicts_earliest_written() {
        let (_, tier) = tier(Some(3), None);
        for n in 0..4u8 {
            tier.insert(key(n), entry(u32::from(n)));
        }
        assert_eq!(tier.len(), 3);
        assert!(tier.get(&key(0)).is_none(), "earliest-written key evicted");
        for n in 1..4u8 {
            assert!(tier.get(&key(n)).is_some());
        }
    }

    #[test]
    fn get_refreshes_recency() {
        let (_, tier) = tier(Some(2), None);
        tier.insert(key(1), entry(1));
        tier.insert(key(2), entry(2));
        tier.get(&key(1));
        tier.insert(key(3), entry(3));
        assert!(tier.get(&key(1)).is_some(), "recently read key survives");
        assert!(tier.get(&key(2)).is_none(), "stale key evicted");
    }

    #[test]
    fn replacing_entry_does_not_evict() {
        let (_, tier) = tier(Some(2), None);
        tier.insert(key(1), entry(1));
        tier.insert(key(2), entry(2));
        tier.insert(key(1), entry(11));
        assert_eq!(tier.len(), 2);
        assert_eq!(tier.get(&key(1)).unwrap().value, 11);
        assert!(tier.get(&key(2)).is_some());
    }

    #[test]
    fn rewrite_restarts_ttl() {
        let (clock, tier) = tier(None, Some(Duration::from_secs(60)));
        tier.insert(key(1), entry(1));
        clock.advance(Duration::from_secs(40));
        tier.insert(key(1), entry(2));
        clock.advance(Duration::from_secs(40));
        assert_eq!(tier.get(&key(1)).unwrap().value, 2);
    }

    #[test]
    fn concurrent_access() {
        use std::thread;

        let (_, tier) = tier(Some(64), None);
        let tier = Arc::new(tier);
        let mut handles = Vec::new();
        for t in 0..4u8 {
            let tier = tier.clone();
            handles.push(thread::spawn(move || {
                for n in 0..32u8 {
                    tier.insert(key(n.wrapping_add(t)), entry(u32::from(n)));
                    tier.get(&key(n));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
