//! [`Fingerprint`] implementations for primitives and standard containers.
//!
//! Children are always folded in through [`Fingerprinter::update`] so hash
//! overrides apply at every depth. Ordered containers hash in their natural
//! order; unordered ones (`HashMap`, `HashSet`) hash a sorted list of
//! per-entry digests, so iteration order never reaches the hash.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use super::{Digest, Fingerprint, Fingerprinter, TAG_CYCLE, TAG_ERR, TAG_MAP, TAG_NONE, TAG_OK,
            TAG_SEQ, TAG_SET, TAG_SOME, TAG_TUPLE};
use crate::error::Result;

impl Fingerprint for () {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_unit();
        Ok(())
    }
}

impl Fingerprint for bool {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_bool(*self);
        Ok(())
    }
}

impl Fingerprint for char {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_char(*self);
        Ok(())
    }
}

macro_rules! impl_fingerprint_uint {
    ($($ty:ty),*) => {$(
        impl Fingerprint for $ty {
            fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
                fp.write_u64(*self as u64);
                Ok(())
            }
        }
    )*};
}

macro_rules! impl_fingerprint_int {
    ($($ty:ty),*) => {$(
        impl Fingerprint for $ty {
            fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
                fp.write_i64(*self as i64);
                Ok(())
            }
        }
    )*};
}

impl_fingerprint_uint!(u8, u16, u32, u64, usize);
impl_fingerprint_int!(i8, i16, i32, i64, isize);

impl Fingerprint for u128 {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_u128(*self);
        Ok(())
    }
}

impl Fingerprint for i128 {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_i128(*self);
        Ok(())
    }
}

impl Fingerprint for f32 {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_f32(*self);
        Ok(())
    }
}

impl Fingerprint for f64 {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_f64(*self);
        Ok(())
    }
}

impl Fingerprint for str {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_str(self);
        Ok(())
    }
}

impl Fingerprint for &str {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_str(self);
        Ok(())
    }
}

impl Fingerprint for String {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_str(self);
        Ok(())
    }
}

impl Fingerprint for Duration {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_u64(self.as_secs());
        fp.write_u64(u64::from(self.subsec_nanos()));
        Ok(())
    }
}

impl Fingerprint for Path {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_bytes(self.as_os_str().as_encoded_bytes());
        Ok(())
    }
}

impl Fingerprint for PathBuf {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        self.as_path().fingerprint(fp)
    }
}

impl Fingerprint for Digest {
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_digest(self);
        Ok(())
    }
}

impl<T> Fingerprint for Option<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        match self {
            None => {
                fp.write_tag(TAG_NONE);
                Ok(())
            }
            Some(value) => {
                fp.write_tag(TAG_SOME);
                fp.update(value)
            }
        }
    }
}

impl<T, E> Fingerprint for std::result::Result<T, E>
where
    T: Fingerprint + 'static,
    E: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        match self {
            Ok(value) => {
                fp.write_tag(TAG_OK);
                fp.update(value)
            }
            Err(err) => {
                fp.write_tag(TAG_ERR);
                fp.update(err)
            }
        }
    }
}

impl<T> Fingerprint for [T]
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_tag(TAG_SEQ);
        fp.write_len(self.len());
        for (i, item) in self.iter().enumerate() {
            fp.scoped(format!("[{i}]"), |fp| fp.update(item))?;
        }
        Ok(())
    }
}

impl<T> Fingerprint for Vec<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        self.as_slice().fingerprint(fp)
    }
}

impl<T, const N: usize> Fingerprint for [T; N]
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        self.as_slice().fingerprint(fp)
    }
}

macro_rules! impl_fingerprint_tuple {
    ($arity:expr => $($idx:tt : $name:ident),+) => {
        impl<$($name),+> Fingerprint for ($($name,)+)
        where
            $($name: Fingerprint + 'static,)+
        {
            fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
                fp.write_tag(TAG_TUPLE);
                fp.write_len($arity);
                $(fp.scoped(concat!(".", stringify!($idx)), |fp| fp.update(&self.$idx))?;)+
                Ok(())
            }
        }
    };
}

impl_fingerprint_tuple!(1 => 0: A);
impl_fingerprint_tuple!(2 => 0: A, 1: B);
impl_fingerprint_tuple!(3 => 0: A, 1: B, 2: C);
impl_fingerprint_tuple!(4 => 0: A, 1: B, 2: C, 3: D);

impl<K, V, S> Fingerprint for HashMap<K, V, S>
where
    K: Fingerprint + 'static,
    V: Fingerprint + 'static,
    S: BuildHasher,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_tag(TAG_MAP);
        fp.write_len(self.len());
        let mut entries = Vec::with_capacity(self.len());
        for (key, value) in self {
            entries.push(fp.subdigest(|c| {
                c.update(key)?;
                c.update(value)
            })?);
        }
        entries.sort_unstable();
        for entry in entries {
            fp.write_digest(&entry);
        }
        Ok(())
    }
}

impl<K, V> Fingerprint for BTreeMap<K, V>
where
    K: Fingerprint + 'static,
    V: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_tag(TAG_MAP);
        fp.write_len(self.len());
        for (key, value) in self {
            fp.update(key)?;
            fp.update(value)?;
        }
        Ok(())
    }
}

impl<T, S> Fingerprint for HashSet<T, S>
where
    T: Fingerprint + 'static,
    S: BuildHasher,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_tag(TAG_SET);
        fp.write_len(self.len());
        let mut entries = Vec::with_capacity(self.len());
        for item in self {
            entries.push(fp.subdigest(|c| c.update(item))?);
        }
        entries.sort_unstable();
        for entry in entries {
            fp.write_digest(&entry);
        }
        Ok(())
    }
}

impl<T> Fingerprint for BTreeSet<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.write_tag(TAG_SET);
        fp.write_len(self.len());
        for item in self {
            fp.update(item)?;
        }
        Ok(())
    }
}

impl<T> Fingerprint for Box<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.update(&**self)
    }
}

// Shared pointers carry the cycle guard: a pointer already on the traversal
// stack hashes as a placeholder instead of recursing forever.

impl<T> Fingerprint for Rc<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        let ptr = Rc::as_ptr(self) as *const ();
        if !fp.enter_shared(ptr) {
            fp.write_tag(TAG_CYCLE);
            return Ok(());
        }
        let result = fp.update(&**self);
        fp.leave_shared();
        result
    }
}

impl<T> Fingerprint for Arc<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        let ptr = Arc::as_ptr(self) as *const ();
        if !fp.enter_shared(ptr) {
            fp.write_tag(TAG_CYCLE);
            return Ok(());
        }
        let result = fp.update(&**self);
        fp.leave_shared();
        result
    }
}

impl<T> Fingerprint for RefCell<T>
where
    T: Fingerprint + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        match self.try_borrow() {
            Ok(inner) => fp.update(&*inner),
            Err(_) => Err(fp.error_unhashable::<Self>()),
        }
    }
}

impl<T> Fingerprint for Cell<T>
where
    T: Fingerprint + Copy + 'static,
{
    fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> Result<()> {
        fp.update(&self.get())
    }
}
