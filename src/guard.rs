//! Mutation guard.
//!
//! The cache hands out values that may share state with what it stored
//! (shared pointers, interior mutability). A caller that mutates such a
//! value in place silently corrupts the cache for every later reader. The
//! guard catches this: writes capture the value's fingerprint, reads
//! recompute it and flag a mismatch. The check is skipped (fingerprint
//! stored as `None`) for functions built with `allow_output_mutation()`.

use crate::error::Result;
use crate::fingerprint::{Fingerprint, HashOverrides, fingerprint};
use crate::tier::memory::CacheEntry;

/// Outcome of a guarded read.
pub(crate) enum GuardedRead<V> {
    /// Value matches its fingerprint-at-write-time (or checking is off).
    Intact(V),
    /// Value no longer matches; it was mutated after caching. The mutated
    /// value is carried so the orchestrator can warn and return it anyway.
    Mutated(V),
}

/// Build a cache entry, capturing the value's fingerprint unless the
/// caller allows output mutation.
pub(crate) fn guard_write<V>(
    value: V,
    allow_output_mutation: bool,
    overrides: Option<&HashOverrides>,
) -> Result<CacheEntry<V>>
where
    V: Fingerprint + 'static,
{
    let fp = if allow_output_mutation {
        None
    } else {
        Some(fingerprint(&value, overrides)?)
    };
    Ok(CacheEntry {
        value,
        fingerprint: fp,
    })
}

/// Re-fingerprint a read entry and compare against its write-time
/// fingerprint.
pub(crate) fn guard_read<V>(
    entry: CacheEntry<V>,
    overrides: Option<&HashOverrides>,
) -> Result<GuardedRead<V>>
where
    V: Fingerprint + 'static,
{
    match entry.fingerprint {
        None => Ok(GuardedRead::Intact(entry.value)),
        Some(expected) => {
            let current = fingerprint(&entry.value, overrides)?;
            if current == expected {
                Ok(GuardedRead::Intact(entry.value))
            } else {
                Ok(GuardedRead::Mutated(entry.value))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::fingerprint::Fingerprinter;

    #[derive(Clone)]
    struct SharedRows(Arc<Mutex<Vec<u32>>>);

    impl SharedRows {
        fn new(rows: Vec<u32>) -> Self {
            Self(Arc::new(Mutex::new(rows)))
        }
    }

    impl Fingerprint for SharedRows {
        fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
            let rows = self.0.lock().expect("rows lock poisoned");
            fp.update(&*rows)
        }
    }

    #[test]
    fn intact_value_passes() {
        let entry = guard_write(vec![1u32, 2, 3], false, None).unwrap();
        assert!(entry.fingerprint.is_some());
        match guard_read(entry, None).unwrap() {
            GuardedRead::Intact(v) => assert_eq!(v, vec![1, 2, 3]),
            GuardedRead::Mutated(_) => panic!("unmutated value flagged"),
        }
    }

    #[test]
    fn mutation_detected_through_shared_state() {
        let rows = SharedRows::new(vec![1, 2, 3]);
        let entry = guard_write(rows.clone(), false, None).unwrap();

        // Caller mutates the value it got back; the cached entry shares
        // the same storage.
        rows.0.lock().unwrap().push(4);

        match guard_read(entry, None).unwrap() {
            GuardedRead::Mutated(v) => {
                assert_eq!(*v.0.lock().unwrap(), vec![1, 2, 3, 4], "mutated value carried")
            }
            GuardedRead::Intact(_) => panic!("mutation not detected"),
        }
    }

    #[test]
    fn allow_output_mutation_skips_check() {
        let rows = SharedRows::new(vec![1, 2, 3]);
        let entry = guard_write(rows.clone(), true, None).unwrap();
        assert!(entry.fingerprint.is_none());

        rows.0.lock().unwrap().push(4);

        assert!(matches!(
            guard_read(entry, None).unwrap(),
            GuardedRead::Intact(_)
        ));
    }
}
