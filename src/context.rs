//! Per-thread call-depth bookkeeping.
//!
//! Two reentrant counters track, for the current thread, how deep we are
//! inside cache-miss recomputations and inside warning-suppression scopes.
//! Both are plain nesting depths: scopes compose, and a nested suppress
//! scope inside an already-suppressed region is a no-op rather than an
//! error. The counters are owned by RAII guards so every exit path — early
//! return, `?`, panic unwinding through the wrapped function — restores
//! them.

use std::cell::Cell;

thread_local! {
    static WITHIN_CACHED_CALL: Cell<u32> = const { Cell::new(0) };
    static SUPPRESS_WARNING: Cell<u32> = const { Cell::new(0) };
}

/// Whether the current thread is executing inside a cache-miss
/// recomputation of a cached function.
///
/// The host application's side-effect-producing operations consult this
/// (through [`Muninn::maybe_warn_side_effect`](crate::Muninn::maybe_warn_side_effect))
/// to detect UI writes from within cached code.
pub fn within_cached_call() -> bool {
    WITHIN_CACHED_CALL.with(|c| c.get() > 0)
}

/// Whether side-effect warnings are currently suppressed on this thread.
pub fn warnings_suppressed() -> bool {
    SUPPRESS_WARNING.with(|c| c.get() > 0)
}

/// RAII scope marking "the wrapped function is executing on this thread".
///
/// Held by [`CachedFn::call`](crate::CachedFn::call) for the duration of the
/// underlying invocation on a cache miss.
#[must_use = "the scope ends when this guard is dropped"]
pub(crate) struct CachedCallScope;

impl CachedCallScope {
    pub(crate) fn enter() -> Self {
        WITHIN_CACHED_CALL.with(|c| c.set(c.get() + 1));
        CachedCallScope
    }
}

impl Drop for CachedCallScope {
    fn drop(&mut self) {
        WITHIN_CACHED_CALL.with(|c| c.set(c.get().saturating_sub(1)));
    }
}

/// RAII scope suppressing side-effect warnings on this thread.
///
/// Nesting is counter-based, so independent scopes compose correctly.
/// The warning path itself takes one of these while emitting, preventing
/// recursive warnings when the sink renders through the same UI machinery
/// it is warning about.
#[must_use = "warnings are re-enabled when this guard is dropped"]
pub struct SuppressWarningScope(());

impl SuppressWarningScope {
    /// Enter a suppression scope. Warnings resume when the guard drops.
    pub fn enter() -> Self {
        SUPPRESS_WARNING.with(|c| c.set(c.get() + 1));
        SuppressWarningScope(())
    }
}

impl Drop for SuppressWarningScope {
    fn drop(&mut self) {
        SUPPRESS_WARNING.with(|c| c.set(c.get().saturating_sub(1)));
    }
}
