//! Read/write protocol across the two tiers.
//!
//! Read order: memory (through the mutation guard) → disk (read-through
//! into memory) → [`MuninnError::KeyNotFound`], which tells the entry
//! point to recompute. A mutated memory hit is a soft hit: the user is
//! warned and the mutated value returned, so their app keeps working while
//! they fix the mutation. A corrupt or unreadable persisted entry is
//! likewise warned and treated as a miss rather than aborting the call.
//!
//! Writes always land in memory; the disk write happens additionally when
//! persistence is enabled, and its failure is reported but never rolls the
//! memory write back.

use tracing::{debug, warn};

use crate::error::{MuninnError, Result};
use crate::fingerprint::{Digest, Fingerprint, HashOverrides};
use crate::guard::{self, GuardedRead};
use crate::surface::{self, MUTATED_OUTPUT_WARNING, WarningSink};
use crate::telemetry;
use crate::tier::disk::{DiskCodec, DiskTier};
use crate::tier::memory::MemoryTier;

pub(crate) struct TierChain<'a, V> {
    pub memory: &'a MemoryTier<V>,
    pub disk: Option<(&'a DiskCodec<V>, &'a DiskTier)>,
    pub allow_output_mutation: bool,
    pub overrides: Option<&'a HashOverrides>,
    pub warnings: &'a dyn WarningSink,
}

/// Read `key` through the tier chain.
///
/// Returns [`MuninnError::KeyNotFound`] only when every enabled tier
/// missed; that error never escapes past the entry point, which responds
/// by invoking the underlying function.
pub(crate) fn read<V>(chain: &TierChain<'_, V>, key: &Digest) -> Result<V>
where
    V: Fingerprint + Clone + 'static,
{
    if let Some(entry) = chain.memory.get(key) {
        return match guard::guard_read(entry, chain.overrides)? {
            GuardedRead::Intact(value) => {
                debug!(key = %key, "memory cache hit");
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "memory").increment(1);
                Ok(value)
            }
            GuardedRead::Mutated(value) => {
                debug!(key = %key, "cached value was mutated");
                metrics::counter!(telemetry::MUTATED_READS_TOTAL).increment(1);
                surface::warn_suppressed(chain.warnings, MUTATED_OUTPUT_WARNING);
                Ok(value)
            }
        };
    }
    debug!(key = %key, "memory cache miss");

    let Some((codec, disk)) = chain.disk else {
        return Err(MuninnError::KeyNotFound { tier: "memory" });
    };

    match (codec.read)(disk, key) {
        Ok(value) => {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "tier" => "disk").increment(1);
            // Read-through: populate memory so the next call hits tier one.
            let entry =
                guard::guard_write(value.clone(), chain.allow_output_mutation, chain.overrides)?;
            chain.memory.insert(*key, entry);
            Ok(value)
        }
        Err(e @ MuninnError::KeyNotFound { .. }) => Err(e),
        Err(e) => {
            warn!(key = %key, error = %e, "failed to read persisted cache entry; recomputing");
            surface::warn_suppressed(
                chain.warnings,
                &format!("Unable to read from the disk cache, recomputing instead: {e}"),
            );
            Err(MuninnError::KeyNotFound { tier: "disk" })
        }
    }
}

/// Write a computed value to every enabled tier.
///
/// A disk failure is surfaced as a warning (the computed value was already
/// handed to the caller and cached in memory); only a fingerprinting
/// failure of the value itself aborts.
pub(crate) fn write<V>(chain: &TierChain<'_, V>, key: &Digest, value: V) -> Result<()>
where
    V: Fingerprint + Clone + 'static,
{
    metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
    let entry = guard::guard_write(value, chain.allow_output_mutation, chain.overrides)?;

    if let Some((codec, disk)) = chain.disk {
        if let Err(e) = (codec.write)(disk, key, &entry.value) {
            warn!(key = %key, error = %e, "failed to persist cache entry");
            metrics::counter!(telemetry::PERSIST_ERRORS_TOTAL).increment(1);
            surface::warn_suppressed(
                chain.warnings,
                &format!("Unable to write to the disk cache: {e}"),
            );
        }
    }

    chain.memory.insert(*key, entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::tier::memory::SystemClock;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }

    impl WarningSink for RecordingSink {
        fn warn(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn key(n: u8) -> Digest {
        fingerprint(&n, None).unwrap()
    }

    fn memory_tier() -> MemoryTier<Vec<u32>> {
        MemoryTier::new(None, None, Arc::new(SystemClock))
    }

    #[test]
    fn miss_without_disk_is_not_found() {
        let memory = memory_tier();
        let sink = RecordingSink::default();
        let chain = TierChain {
            memory: &memory,
            disk: None,
            allow_output_mutation: false,
            overrides: None,
            warnings: &sink,
        };
        assert!(matches!(
            read(&chain, &key(1)),
            Err(MuninnError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn write_then_read_memory_only() {
        let memory = memory_tier();
        let sink = RecordingSink::default();
        let chain = TierChain {
            memory: &memory,
            disk: None,
            allow_output_mutation: false,
            overrides: None,
            warnings: &sink,
        };
        write(&chain, &key(1), vec![1, 2, 3]).unwrap();
        assert_eq!(read(&chain, &key(1)).unwrap(), vec![1, 2, 3]);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[test]
    fn disk_read_through_populates_memory() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskTier::new(dir.path().join("cache"));
        let codec = DiskCodec::<Vec<u32>>::new();
        let memory = memory_tier();
        let sink = RecordingSink::default();
        let chain = TierChain {
            memory: &memory,
            disk: Some((&codec, &disk)),
            allow_output_mutation: false,
            overrides: None,
            warnings: &sink,
        };

        write(&chain, &key(1), vec![4, 5]).unwrap();

        // Fresh memory tier simulates a process restart.
        let cold_memory = memory_tier();
        let cold_chain = TierChain {
            memory: &cold_memory,
            ..chain
        };
        assert_eq!(read(&cold_chain, &key(1)).unwrap(), vec![4, 5]);
        assert_eq!(cold_memory.len(), 1, "read-through populated memory");
    }

    #[test]
    fn corrupt_disk_entry_warns_and_misses() {
        let dir = tempfile::tempdir().unwrap();
        let disk = DiskTier::new(dir.path().join("cache"));
        let codec = DiskCodec::<Vec<u32>>::new();
        let memory = memory_tier();
        let sink = RecordingSink::default();
        let chain = TierChain {
            memory: &memory,
            disk: Some((&codec, &disk)),
            allow_output_mutation: false,
            overrides: None,
            warnings: &sink,
        };

        std::fs::create_dir_all(disk.root()).unwrap();
        let path = disk.root().join(format!("{}.json", key(1).to_hex()));
        std::fs::write(&path, "garbage").unwrap();

        assert!(matches!(
            read(&chain, &key(1)),
            Err(MuninnError::KeyNotFound { .. })
        ));
        assert_eq!(sink.messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn disk_write_failure_keeps_memory_write() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the cache directory should be makes every disk
        // write fail.
        let blocked = dir.path().join("cache");
        std::fs::write(&blocked, "occupied").unwrap();

        let disk = DiskTier::new(&blocked);
        let codec = DiskCodec::<Vec<u32>>::new();
        let memory = memory_tier();
        let sink = RecordingSink::default();
        let chain = TierChain {
            memory: &memory,
            disk: Some((&codec, &disk)),
            allow_output_mutation: false,
            overrides: None,
            warnings: &sink,
        };

        write(&chain, &key(1), vec![1]).unwrap();
        assert_eq!(read(&chain, &key(1)).unwrap(), vec![1], "memory still caches");
        assert_eq!(sink.messages.lock().unwrap().len(), 1, "failure was reported");
    }
}
