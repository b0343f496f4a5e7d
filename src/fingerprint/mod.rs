//! Content-addressed fingerprinting.
//!
//! A fingerprint is a SHA-256 digest computed from a value's structure:
//! every leaf is written with a domain-separating type tag and a length
//! prefix, so semantically different values cannot collide by
//! concatenation (`["ab", "c"]` vs `["a", "bc"]`). Digests are stable
//! across processes, which the disk tier relies on — entry file names are
//! the hex rendering of a call's fingerprint.
//!
//! # Traversal
//!
//! [`Fingerprint`] is implemented for the primitives, standard containers,
//! and shared-pointer types in [`value`]. All traversal funnels through
//! [`Fingerprinter::update`], which consults the caller's [`HashOverrides`]
//! before the built-in implementation — callers declare non-deterministic
//! or identity-hashed types (connection handles, clients) there. A type
//! that cannot be structurally hashed implements [`Fingerprint`] by
//! returning [`Fingerprinter::error_unhashable`], making an override
//! mandatory; the error names the offending type and its path within the
//! traversed structure.
//!
//! # Cycles
//!
//! Shared pointers (`Rc`, `Arc`) are traversed at most once per traversal
//! stack: re-entering a pointer already being hashed writes a placeholder
//! instead of recursing, so self-referential graphs terminate.

pub mod overrides;
pub mod value;

pub use overrides::HashOverrides;

use std::any::{Any, TypeId};
use std::fmt;

use sha2::{Digest as _, Sha256};

use crate::error::{MuninnError, Result};

// Domain-separation tags. One per leaf shape; changing these invalidates
// every persisted cache entry.
pub(crate) const TAG_UNIT: u8 = 0x01;
pub(crate) const TAG_BOOL: u8 = 0x02;
pub(crate) const TAG_UINT: u8 = 0x03;
pub(crate) const TAG_INT: u8 = 0x04;
pub(crate) const TAG_U128: u8 = 0x05;
pub(crate) const TAG_I128: u8 = 0x06;
pub(crate) const TAG_F32: u8 = 0x07;
pub(crate) const TAG_F64: u8 = 0x08;
pub(crate) const TAG_CHAR: u8 = 0x09;
pub(crate) const TAG_STR: u8 = 0x0a;
pub(crate) const TAG_BYTES: u8 = 0x0b;
pub(crate) const TAG_NONE: u8 = 0x0c;
pub(crate) const TAG_SOME: u8 = 0x0d;
pub(crate) const TAG_OK: u8 = 0x0e;
pub(crate) const TAG_ERR: u8 = 0x0f;
pub(crate) const TAG_SEQ: u8 = 0x10;
pub(crate) const TAG_MAP: u8 = 0x11;
pub(crate) const TAG_SET: u8 = 0x12;
pub(crate) const TAG_TUPLE: u8 = 0x13;
pub(crate) const TAG_CYCLE: u8 = 0x14;
pub(crate) const TAG_DIGEST: u8 = 0x15;

/// A 32-byte structural fingerprint.
///
/// Used as the memory-tier entry key, the disk-tier file name (hex), and
/// the mutation guard's equality proxy.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, e.g. for disk file names.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 8 hex chars are plenty for log correlation.
        write!(f, "Digest({}…)", &self.to_hex()[..8])
    }
}

/// A value that can be folded into a [`Fingerprinter`].
///
/// Implementations write their structure through the fingerprinter's
/// `write_*` primitives and recurse into children via
/// [`Fingerprinter::update`] (never by calling `fingerprint` directly, so
/// children stay eligible for hash overrides).
pub trait Fingerprint {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()>;
}

/// Incremental structural hasher.
///
/// Tracks the traversal path (for [`MuninnError::Unhashable`] reporting)
/// and the stack of shared pointers currently being hashed (for cycle
/// detection).
pub struct Fingerprinter<'a> {
    hasher: Sha256,
    overrides: Option<&'a HashOverrides>,
    path: Vec<String>,
    active: Vec<*const ()>,
}

impl<'a> Fingerprinter<'a> {
    pub fn new(overrides: Option<&'a HashOverrides>) -> Self {
        Self {
            hasher: Sha256::new(),
            overrides,
            path: Vec::new(),
            active: Vec::new(),
        }
    }

    /// Consume the fingerprinter and produce the digest.
    pub fn finish(self) -> Digest {
        Digest(self.hasher.finalize().into())
    }

    /// Fold `value` into the hash, consulting hash overrides first.
    pub fn update<T>(&mut self, value: &T) -> Result<()>
    where
        T: Fingerprint + 'static,
    {
        let overrides = self.overrides;
        if let Some(custom) = overrides.and_then(|o| o.get(TypeId::of::<T>())) {
            return custom(value as &dyn Any, self);
        }
        value.fingerprint(self)
    }

    // --- leaf primitives -------------------------------------------------

    fn raw(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    pub fn write_tag(&mut self, tag: u8) {
        self.raw(&[tag]);
    }

    /// Raw length prefix (no tag); used by container implementations.
    pub fn write_len(&mut self, len: usize) {
        self.raw(&(len as u64).to_le_bytes());
    }

    pub fn write_unit(&mut self) {
        self.write_tag(TAG_UNIT);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_tag(TAG_BOOL);
        self.raw(&[v as u8]);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write_tag(TAG_UINT);
        self.raw(&v.to_le_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.write_tag(TAG_INT);
        self.raw(&v.to_le_bytes());
    }

    pub fn write_u128(&mut self, v: u128) {
        self.write_tag(TAG_U128);
        self.raw(&v.to_le_bytes());
    }

    pub fn write_i128(&mut self, v: i128) {
        self.write_tag(TAG_I128);
        self.raw(&v.to_le_bytes());
    }

    /// Floats hash by bit pattern: `0.0` and `-0.0` differ, and a NaN is
    /// equal to itself bit-for-bit.
    pub fn write_f64(&mut self, v: f64) {
        self.write_tag(TAG_F64);
        self.raw(&v.to_bits().to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_tag(TAG_F32);
        self.raw(&v.to_bits().to_le_bytes());
    }

    pub fn write_char(&mut self, v: char) {
        self.write_tag(TAG_CHAR);
        self.raw(&(v as u32).to_le_bytes());
    }

    pub fn write_str(&mut self, v: &str) {
        self.write_tag(TAG_STR);
        self.write_len(v.len());
        self.raw(v.as_bytes());
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.write_tag(TAG_BYTES);
        self.write_len(v.len());
        self.raw(v);
    }

    pub fn write_digest(&mut self, v: &Digest) {
        self.write_tag(TAG_DIGEST);
        self.raw(v.as_bytes());
    }

    // --- traversal support -----------------------------------------------

    /// Run `f` with `segment` pushed onto the traversal path.
    pub fn scoped<R>(
        &mut self,
        segment: impl Into<String>,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        self.path.push(segment.into());
        let result = f(self);
        self.path.pop();
        result
    }

    /// Compute an independent digest with the same overrides and path.
    ///
    /// Used for unordered containers: per-entry digests are sorted before
    /// being folded in, so iteration order cannot leak into the result.
    pub fn subdigest(
        &self,
        f: impl FnOnce(&mut Fingerprinter<'a>) -> Result<()>,
    ) -> Result<Digest> {
        let mut child = Fingerprinter {
            hasher: Sha256::new(),
            overrides: self.overrides,
            path: self.path.clone(),
            active: self.active.clone(),
        };
        f(&mut child)?;
        Ok(child.finish())
    }

    /// Mark a shared pointer as being traversed. Returns `false` when the
    /// pointer is already on the traversal stack (a cycle); the caller
    /// writes [`TAG_CYCLE`] instead of recursing and must not call
    /// [`Fingerprinter::leave_shared`].
    pub fn enter_shared(&mut self, ptr: *const ()) -> bool {
        if self.active.contains(&ptr) {
            return false;
        }
        self.active.push(ptr);
        true
    }

    pub fn leave_shared(&mut self) {
        self.active.pop();
    }

    /// Build the error for a value that cannot be fingerprinted at the
    /// current traversal path.
    pub fn error_unhashable<T: ?Sized>(&self) -> MuninnError {
        let path = if self.path.is_empty() {
            "the root value".to_string()
        } else {
            self.path.join("")
        };
        MuninnError::Unhashable {
            type_name: std::any::type_name::<T>(),
            path,
        }
    }
}

/// Fingerprint a single value.
pub fn fingerprint<T>(value: &T, overrides: Option<&HashOverrides>) -> Result<Digest>
where
    T: Fingerprint + 'static,
{
    let mut fp = Fingerprinter::new(overrides);
    fp.update(value)?;
    Ok(fp.finish())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn deterministic_within_process() {
        let v = (42u32, "hello".to_string(), vec![1.5f64, 2.5]);
        let a = fingerprint(&v, None).unwrap();
        let b = fingerprint(&v, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_values_distinct_digests() {
        let a = fingerprint(&vec![1u64, 2, 3], None).unwrap();
        let b = fingerprint(&vec![1u64, 2, 4], None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn concatenation_boundaries_do_not_collide() {
        let a = fingerprint(&vec!["ab".to_string(), "c".to_string()], None).unwrap();
        let b = fingerprint(&vec!["a".to_string(), "bc".to_string()], None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn type_tags_separate_same_bytes() {
        let a = fingerprint(&1u64, None).unwrap();
        let b = fingerprint(&1i64, None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn map_digest_ignores_iteration_order() {
        // Build the same map with different insertion orders; HashMap
        // iteration order differs, the digest must not.
        let mut forward = HashMap::new();
        for i in 0..64u32 {
            forward.insert(i, i * 2);
        }
        let mut reverse = HashMap::new();
        for i in (0..64u32).rev() {
            reverse.insert(i, i * 2);
        }
        assert_eq!(
            fingerprint(&forward, None).unwrap(),
            fingerprint(&reverse, None).unwrap()
        );
    }

    struct Node {
        label: u32,
        next: RefCell<Option<Rc<Node>>>,
    }

    impl Fingerprint for Node {
        fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
            fp.scoped(".label", |fp| fp.update(&self.label))?;
            fp.scoped(".next", |fp| fp.update(&self.next))
        }
    }

    #[test]
    fn self_referential_graph_terminates() {
        let node = Rc::new(Node {
            label: 7,
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(Rc::clone(&node));

        let a = fingerprint(&node, None).unwrap();
        let b = fingerprint(&node, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_but_acyclic_nodes_hash_fully() {
        // The same Rc appearing twice side by side is not a cycle; both
        // occurrences must contribute their full structure.
        let shared = Rc::new(Node {
            label: 1,
            next: RefCell::new(None),
        });
        let pair = vec![Rc::clone(&shared), Rc::clone(&shared)];
        let other = vec![
            Rc::new(Node {
                label: 1,
                next: RefCell::new(None),
            }),
            Rc::new(Node {
                label: 2,
                next: RefCell::new(None),
            }),
        ];
        assert_ne!(
            fingerprint(&pair, None).unwrap(),
            fingerprint(&other, None).unwrap()
        );
    }

    struct DbHandle {
        #[allow(dead_code)]
        endpoint: String,
    }

    impl Fingerprint for DbHandle {
        fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
            Err(fp.error_unhashable::<Self>())
        }
    }

    #[test]
    fn unhashable_reports_type_and_path() {
        let value = vec![(1u32, DbHandle {
            endpoint: "db://prod".into(),
        })];
        let err = fingerprint(&value, None).unwrap_err();
        match err {
            MuninnError::Unhashable { type_name, path } => {
                assert!(type_name.contains("DbHandle"));
                assert!(path.contains("[0]"), "path was {path:?}");
                assert!(path.contains(".1"), "path was {path:?}");
            }
            other => panic!("expected Unhashable, got {other}"),
        }
    }

    #[test]
    fn override_rescues_unhashable_type() {
        let overrides =
            HashOverrides::new().with(|h: &DbHandle, fp| Ok(fp.write_str(&h.endpoint)));
        let value = DbHandle {
            endpoint: "db://prod".into(),
        };
        let digest = fingerprint(&value, Some(&overrides)).unwrap();
        assert_eq!(digest, fingerprint(&value, Some(&overrides)).unwrap());
    }

    #[test]
    fn override_changes_builtin_behavior() {
        // Treat every u64 as equal, regardless of value.
        let overrides = HashOverrides::new().with(|_: &u64, fp| Ok(fp.write_str("any")));
        let a = fingerprint(&1u64, Some(&overrides)).unwrap();
        let b = fingerprint(&2u64, Some(&overrides)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_hex_is_64_chars() {
        let d = fingerprint(&0u64, None).unwrap();
        assert_eq!(d.to_hex().len(), 64);
        assert_eq!(d.to_string(), d.to_hex());
    }
}
