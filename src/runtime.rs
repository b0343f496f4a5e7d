//! The process-wide caching runtime.
//!
//! [`Muninn`] owns the tier registry, the disk tier, and the host-facing
//! surfaces. It is an explicit object handed to whichever subsystem owns
//! process bootstrap — there is no ambient global state, and cloning the
//! handle is cheap (everything inside is shared).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cached::{CacheBuilder, FnSource};
use crate::config::{ConfigSource, StaticConfig};
use crate::context;
use crate::surface::{self, LogWarningSink, NoProgress, ProgressSink, WarningSink};
use crate::tier::disk::DiskTier;
use crate::tier::memory::{Clock, SystemClock};
use crate::tier::registry::TierRegistry;

pub(crate) struct RuntimeInner {
    pub(crate) tiers: TierRegistry,
    pub(crate) disk: DiskTier,
    pub(crate) config: Arc<dyn ConfigSource>,
    pub(crate) warnings: Arc<dyn WarningSink>,
    pub(crate) progress: Arc<dyn ProgressSink>,
}

/// Handle to the caching runtime. Clones share all state.
#[derive(Clone)]
pub struct Muninn {
    pub(crate) inner: Arc<RuntimeInner>,
}

impl Muninn {
    /// Create a builder for configuring the runtime.
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }

    /// Wrap `func` for caching. Returns a builder for the per-function
    /// parameters; finish with [`CacheBuilder::build`].
    ///
    /// ```rust
    /// # use muninn::{Muninn, fn_source};
    /// let muninn = Muninn::builder().build();
    /// let double = muninn.cached(fn_source!("double"), |x: &i64| x * 2).build()?;
    /// assert_eq!(double.call(&21)?, 42);
    /// # Ok::<(), muninn::MuninnError>(())
    /// ```
    pub fn cached<F, A, V>(&self, source: FnSource, func: F) -> CacheBuilder<F, A, V>
    where
        F: Fn(&A) -> V,
    {
        CacheBuilder::new(self.inner.clone(), source, func)
    }

    /// Clear every function's in-memory tier. Always succeeds.
    pub fn clear_memory(&self) {
        self.inner.tiers.clear();
    }

    /// Remove the on-disk cache directory.
    ///
    /// Returns whether a directory existed and was removed.
    pub fn clear_disk(&self) -> bool {
        self.inner.disk.clear_all()
    }

    /// Clear both tiers: all memory caches and the disk directory.
    ///
    /// Returns the disk result, like [`Muninn::clear_disk`].
    pub fn clear_all(&self) -> bool {
        self.clear_memory();
        self.clear_disk()
    }

    /// Directory holding persisted cache entries.
    pub fn cache_dir(&self) -> &Path {
        self.inner.disk.root()
    }

    /// Host hook: warn (through the configured sink) that a
    /// side-effect-producing operation ran inside a cached function.
    ///
    /// The host's UI-emitting operations call this unconditionally; it is
    /// a no-op unless the current thread is inside a cache-miss
    /// recomputation with no suppression scope active, and the emission
    /// itself suppresses recursive warnings.
    pub fn maybe_warn_side_effect(&self) {
        surface::maybe_warn_side_effect(&*self.inner.warnings);
    }

    /// Whether the current thread is inside a cache-miss recomputation.
    pub fn within_cached_call(&self) -> bool {
        context::within_cached_call()
    }
}

impl Default for Muninn {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for configuring [`Muninn`] runtimes.
pub struct MuninnBuilder {
    cache_dir: Option<PathBuf>,
    config: Option<Arc<dyn ConfigSource>>,
    warnings: Option<Arc<dyn WarningSink>>,
    progress: Option<Arc<dyn ProgressSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl MuninnBuilder {
    pub fn new() -> Self {
        Self {
            cache_dir: None,
            config: None,
            warnings: None,
            progress: None,
            clock: None,
        }
    }

    /// Directory for persisted entries. Defaults to
    /// `<platform cache dir>/muninn`.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Source of the global enable flag. Defaults to always-enabled.
    pub fn config(mut self, config: Arc<dyn ConfigSource>) -> Self {
        self.config = Some(config);
        self
    }

    /// Sink for user-visible cache warnings. Defaults to `tracing` logs.
    pub fn warning_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.warnings = Some(sink);
        self
    }

    /// Sink for the "Running f()…" indicator. Defaults to none.
    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Time source for TTL checks. Defaults to the system clock; tests
    /// substitute [`ManualClock`](crate::ManualClock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Muninn {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        Muninn {
            inner: Arc::new(RuntimeInner {
                tiers: TierRegistry::new(clock),
                disk: DiskTier::new(self.cache_dir.unwrap_or_else(DiskTier::default_root)),
                config: self
                    .config
                    .unwrap_or_else(|| Arc::new(StaticConfig::default())),
                warnings: self.warnings.unwrap_or_else(|| Arc::new(LogWarningSink)),
                progress: self.progress.unwrap_or_else(|| Arc::new(NoProgress)),
            }),
        }
    }
}

impl Default for MuninnBuilder {
    fn default() -> Self {
        Self::new()
    }
}
