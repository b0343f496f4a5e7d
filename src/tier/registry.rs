//! Process-wide registry of per-function memory tiers.
//!
//! Maps cache slot id (the digest of a function's definition) to that
//! function's [`MemoryTier`]. Tiers are created lazily on first access and
//! replaced wholesale when the function's declared bounds change — in a
//! rerun-driven app the decorator expression is re-evaluated on every
//! rerun, so changed `max_entries`/`ttl` parameters arrive as a fresh
//! `get_or_create` with different values, and the stale tier (with its
//! stale contents) is dropped.
//!
//! Tiers for different functions cache different value types, so the map
//! stores them type-erased and `get_or_create` downcasts.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use crate::fingerprint::Digest;
use crate::tier::memory::{Clock, MemoryTier};

struct Registered {
    max_entries: Option<u64>,
    ttl: Option<Duration>,
    tier: Arc<dyn Any + Send + Sync>,
}

/// Registry of all in-memory cache tiers, keyed by slot id.
pub struct TierRegistry {
    clock: Arc<dyn Clock>,
    tiers: Mutex<HashMap<Digest, Registered>>,
}

impl TierRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tiers: Mutex::new(HashMap::new()),
        }
    }

    /// Return the tier for `slot`, creating or replacing it as needed.
    ///
    /// An existing tier is reused only when its bounds match exactly;
    /// otherwise a fresh, empty tier with the new bounds takes its place.
    pub fn get_or_create<V>(
        &self,
        slot: Digest,
        max_entries: Option<u64>,
        ttl: Option<Duration>,
    ) -> Arc<MemoryTier<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let mut tiers = self.tiers.lock().expect("tier registry lock poisoned");
        if let Some(registered) = tiers.get(&slot) {
            if registered.max_entries == max_entries && registered.ttl == ttl {
                if let Ok(tier) = registered.tier.clone().downcast::<MemoryTier<V>>() {
                    return tier;
                }
            }
            debug!(
                slot = %slot,
                ?max_entries,
                ?ttl,
                "cache parameters changed; resetting tier"
            );
        } else {
            debug!(slot = %slot, ?max_entries, ?ttl, "creating memory tier");
        }

        let tier = Arc::new(MemoryTier::<V>::new(max_entries, ttl, self.clock.clone()));
        tiers.insert(slot, Registered {
            max_entries,
            ttl,
            tier: tier.clone(),
        });
        tier
    }

    /// Drop every function's tier.
    pub fn clear(&self) {
        let mut tiers = self.tiers.lock().expect("tier registry lock poisoned");
        debug!(count = tiers.len(), "clearing all memory tiers");
        tiers.clear();
    }

    /// Number of registered tiers.
    pub fn len(&self) -> usize {
        self.tiers.lock().expect("tier registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
