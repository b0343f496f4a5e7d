//! The cached-function entry point.
//!
//! [`Muninn::cached`](crate::Muninn::cached) wraps a target function and
//! returns a [`CacheBuilder`]; [`CacheBuilder::build`] yields the
//! [`CachedFn`] the application calls instead of the original.
//!
//! # Identity and invalidation
//!
//! The cache slot id — the key under which a function's memory tier is
//! registered — is computed once, at build time, from the function's
//! defining module, its name, and a code digest. The code digest folds in
//! the function's compiler-assigned type name, an optional explicit code
//! token, the fingerprints of any captured values declared with
//! [`CacheBuilder::capture`], and the code digests of any cached helpers
//! declared with [`CacheBuilder::depends_on`] — so changing a helper's
//! identity invalidates everything declared to call it, transitively.
//!
//! The per-call fingerprint combines that code digest with the call's
//! argument fingerprint. It is globally unique across all cached
//! functions (it names the entry's disk file, which is not per-function),
//! which is why it incorporates the code digest even though it indexes
//! into a per-function memory tier.
//!
//! # Rerun behaviour
//!
//! In a rerun-driven app the wrapping expression re-executes on every
//! rerun, producing a fresh `CachedFn` each time. That is by design: the
//! tier registry keys on slot id, so the fresh wrapper finds the existing
//! tier — unless its `max_entries`/`ttl` changed, in which case the tier
//! is reset (see [`TierRegistry`](crate::tier::registry::TierRegistry)).

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::context::{CachedCallScope, SuppressWarningScope};
use crate::error::{MuninnError, Result};
use crate::fingerprint::{Digest, Fingerprint, Fingerprinter, HashOverrides, fingerprint};
use crate::orchestrator::{self, TierChain};
use crate::runtime::RuntimeInner;
use crate::surface::ProgressSink;

/// Where a cached function is defined: module path plus name.
///
/// Two identical functions in different modules must not share a cache
/// slot; the source is folded into both the slot id and the code digest.
/// Use [`fn_source!`](crate::fn_source) to capture the module path
/// automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FnSource {
    module: &'static str,
    name: &'static str,
}

impl FnSource {
    pub const fn new(module: &'static str, name: &'static str) -> Self {
        Self { module, name }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Display for FnSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// Build a [`FnSource`] from the current module path and a function name.
#[macro_export]
macro_rules! fn_source {
    ($name:expr) => {
        $crate::FnSource::new(module_path!(), $name)
    };
}

/// Per-function cache parameters.
///
/// Created by [`Muninn::cached`](crate::Muninn::cached). All parameters
/// are optional; [`CacheBuilder::build`] validates them and computes the
/// function's cache identity.
pub struct CacheBuilder<F, A, V> {
    runtime: Arc<RuntimeInner>,
    source: FnSource,
    func: F,
    max_entries: Option<u64>,
    ttl: Option<Duration>,
    allow_output_mutation: bool,
    suppress_side_effect_warning: bool,
    show_progress: bool,
    overrides: Option<Arc<HashOverrides>>,
    code_token: Option<String>,
    captures: Vec<Digest>,
    deps: Vec<Digest>,
    disk_codec: Option<crate::tier::disk::DiskCodec<V>>,
    _marker: PhantomData<fn(&A) -> V>,
}

impl<F, A, V> CacheBuilder<F, A, V> {
    pub(crate) fn new(runtime: Arc<RuntimeInner>, source: FnSource, func: F) -> Self {
        Self {
            runtime,
            source,
            func,
            max_entries: None,
            ttl: None,
            allow_output_mutation: false,
            suppress_side_effect_warning: false,
            show_progress: true,
            overrides: None,
            code_token: None,
            captures: Vec::new(),
            deps: Vec::new(),
            disk_codec: None,
            _marker: PhantomData,
        }
    }

    /// Bound the memory tier to `n` entries (least recently used evicted
    /// on overflow). Unbounded by default.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = Some(n);
        self
    }

    /// Expire entries `ttl` after they were written. Never by default.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Enable the disk tier for this function.
    pub fn persist(mut self) -> Self
    where
        V: Serialize + DeserializeOwned,
    {
        self.disk_codec = Some(crate::tier::disk::DiskCodec::new());
        self
    }

    /// Skip the mutation guard: entries are stored without a fingerprint
    /// and reads never check for post-cache mutation.
    pub fn allow_output_mutation(mut self) -> Self {
        self.allow_output_mutation = true;
        self
    }

    /// Suppress side-effect warnings for the whole wrapped call.
    pub fn suppress_side_effect_warning(mut self) -> Self {
        self.suppress_side_effect_warning = true;
        self
    }

    /// Don't show the progress indicator while the call executes.
    pub fn no_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Per-type hash overrides, consulted when fingerprinting this
    /// function's arguments, captures, and return values.
    ///
    /// Set this before [`CacheBuilder::capture`] so captures are hashed
    /// under the overrides too.
    pub fn hash_overrides(mut self, overrides: HashOverrides) -> Self {
        self.overrides = Some(Arc::new(overrides));
        self
    }

    /// Fold an explicit version token into the code digest. Bump it when
    /// the function's logic changes in a way its type name cannot reflect
    /// and persisted entries must be invalidated.
    pub fn code_token(mut self, token: impl Into<String>) -> Self {
        self.code_token = Some(token.into());
        self
    }

    /// Declare a value the function closes over. Its fingerprint becomes
    /// part of the code digest, so changed captured state invalidates the
    /// cache the way changed code does.
    pub fn capture<T>(mut self, value: &T) -> Result<Self>
    where
        T: Fingerprint + 'static,
    {
        let digest = fingerprint(value, self.overrides.as_deref())?;
        self.captures.push(digest);
        Ok(self)
    }

    /// Declare a cached helper this function calls. The helper's code
    /// digest becomes part of this function's, so invalidation propagates
    /// through the declared call graph.
    pub fn depends_on(mut self, code_digest: Digest) -> Self {
        self.deps.push(code_digest);
        self
    }

    /// Validate parameters and compute the function's cache identity.
    ///
    /// Fails immediately — not on first call — for bounds that cannot
    /// form a working tier.
    pub fn build(self) -> Result<CachedFn<F, A, V>> {
        if self.max_entries == Some(0) {
            return Err(MuninnError::Configuration(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if self.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(MuninnError::Configuration(
                "ttl must be non-zero".to_string(),
            ));
        }

        let mut fp = Fingerprinter::new(None);
        fp.write_str(self.source.module);
        fp.write_str(self.source.name);
        fp.write_str(std::any::type_name::<F>());
        if let Some(token) = &self.code_token {
            fp.write_str(token);
        }
        for capture in &self.captures {
            fp.write_digest(capture);
        }
        for dep in &self.deps {
            fp.write_digest(dep);
        }
        let code = fp.finish();

        let mut fp = Fingerprinter::new(None);
        fp.write_str(self.source.module);
        fp.write_str(self.source.name);
        fp.write_digest(&code);
        let slot = fp.finish();

        debug!(source = %self.source, slot = %slot, "cache slot id computed");

        Ok(CachedFn {
            runtime: self.runtime,
            source: self.source,
            func: self.func,
            code,
            slot,
            max_entries: self.max_entries,
            ttl: self.ttl,
            allow_output_mutation: self.allow_output_mutation,
            suppress_side_effect_warning: self.suppress_side_effect_warning,
            show_progress: self.show_progress,
            overrides: self.overrides,
            disk_codec: self.disk_codec,
            _marker: PhantomData,
        })
    }
}

/// A function wrapped for caching. Call through [`CachedFn::call`].
pub struct CachedFn<F, A, V> {
    runtime: Arc<RuntimeInner>,
    source: FnSource,
    func: F,
    code: Digest,
    slot: Digest,
    max_entries: Option<u64>,
    ttl: Option<Duration>,
    allow_output_mutation: bool,
    suppress_side_effect_warning: bool,
    show_progress: bool,
    overrides: Option<Arc<HashOverrides>>,
    disk_codec: Option<crate::tier::disk::DiskCodec<V>>,
    _marker: PhantomData<fn(&A) -> V>,
}

struct ProgressGuard<'a>(&'a dyn ProgressSink);

impl<'a> ProgressGuard<'a> {
    fn start(sink: &'a dyn ProgressSink, message: &str) -> Self {
        sink.started(message);
        Self(sink)
    }
}

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        self.0.finished();
    }
}

impl<F, A, V> CachedFn<F, A, V>
where
    F: Fn(&A) -> V,
    A: Fingerprint + 'static,
    V: Fingerprint + Clone + Send + Sync + 'static,
{
    /// Invoke the wrapped function through the cache.
    ///
    /// With the global caching flag off this is a plain passthrough — no
    /// tier lookup, no fingerprinting. Otherwise: fingerprint the call,
    /// read memory → disk, and on a full miss execute the underlying
    /// function (with the thread marked as inside a cached call) and
    /// store the result in every enabled tier.
    pub fn call(&self, args: &A) -> Result<V> {
        if !self.runtime.config.caching_enabled() {
            debug!(source = %self.source, "caching disabled; calling directly");
            return Ok((self.func)(args));
        }

        let _progress = if self.show_progress {
            Some(ProgressGuard::start(
                &*self.runtime.progress,
                &format!("Running {}()…", self.source.name),
            ))
        } else {
            None
        };

        let tier =
            self.runtime
                .tiers
                .get_or_create::<V>(self.slot, self.max_entries, self.ttl);
        let key = self.call_key(args)?;
        let chain = TierChain {
            memory: &*tier,
            disk: self
                .disk_codec
                .as_ref()
                .map(|codec| (codec, &self.runtime.disk)),
            allow_output_mutation: self.allow_output_mutation,
            overrides: self.overrides.as_deref(),
            warnings: &*self.runtime.warnings,
        };

        match orchestrator::read(&chain, &key) {
            Ok(value) => {
                debug!(source = %self.source, key = %key, "cache hit");
                Ok(value)
            }
            Err(MuninnError::KeyNotFound { .. }) => {
                debug!(source = %self.source, key = %key, "cache miss; executing");
                let value = {
                    let _call = CachedCallScope::enter();
                    let _suppress = self
                        .suppress_side_effect_warning
                        .then(SuppressWarningScope::enter);
                    (self.func)(args)
                };
                orchestrator::write(&chain, &key, value.clone())?;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    /// Fingerprint for one call: code digest plus argument fingerprint.
    fn call_key(&self, args: &A) -> Result<Digest> {
        let mut fp = Fingerprinter::new(self.overrides.as_deref());
        fp.write_digest(&self.code);
        fp.scoped("args", |fp| fp.update(args))?;
        Ok(fp.finish())
    }
}

impl<F, A, V> CachedFn<F, A, V> {
    /// This function's code digest, for other functions'
    /// [`CacheBuilder::depends_on`] declarations.
    pub fn code_digest(&self) -> Digest {
        self.code
    }

    /// Where the wrapped function is defined.
    pub fn source(&self) -> FnSource {
        self.source
    }
}
