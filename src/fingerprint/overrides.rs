//! Per-type hash override table.
//!
//! Overrides let a caller replace the built-in traversal for a specific
//! runtime type — typically to hash an unhashable or non-deterministic
//! value (a connection handle, a client) by some stable property instead.
//! [`Fingerprinter::update`](super::Fingerprinter::update) consults the
//! table before the type's own [`Fingerprint`](super::Fingerprint)
//! implementation, so an override wins even for types the engine knows how
//! to hash.
//!
//! ```rust
//! use muninn::{Fingerprinter, HashOverrides};
//!
//! struct Connection {
//!     url: String,
//! }
//!
//! impl muninn::Fingerprint for Connection {
//!     fn fingerprint(&self, fp: &mut Fingerprinter<'_>) -> muninn::Result<()> {
//!         // No structural hash makes sense; require an override.
//!         Err(fp.error_unhashable::<Self>())
//!     }
//! }
//!
//! let overrides = HashOverrides::new().with(|c: &Connection, fp| {
//!     fp.write_str(&c.url);
//!     Ok(())
//! });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::fingerprint::Fingerprinter;

type OverrideFn =
    Box<dyn for<'f> Fn(&dyn Any, &mut Fingerprinter<'f>) -> Result<()> + Send + Sync>;

/// Mapping from runtime type to custom digest function.
#[derive(Default)]
pub struct HashOverrides {
    funcs: HashMap<TypeId, OverrideFn>,
}

impl HashOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an override for type `T`, replacing any existing one.
    ///
    /// The closure receives the value and the active fingerprinter; it
    /// writes whatever representation should stand in for the value.
    pub fn with<T, F>(mut self, f: F) -> Self
    where
        T: 'static,
        F: for<'f> Fn(&T, &mut Fingerprinter<'f>) -> Result<()> + Send + Sync + 'static,
    {
        self.funcs.insert(
            TypeId::of::<T>(),
            Box::new(move |any, fp| match any.downcast_ref::<T>() {
                Some(value) => f(value, fp),
                None => unreachable!("override invoked with mismatched TypeId"),
            }),
        );
        self
    }

    /// Number of registered overrides.
    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub(crate) fn get(&self, id: TypeId) -> Option<&OverrideFn> {
        self.funcs.get(&id)
    }
}

impl fmt::Debug for HashOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashOverrides")
            .field("types", &self.funcs.len())
            .finish()
    }
}
