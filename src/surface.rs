//! Warning and progress surfaces.
//!
//! Muninn never renders UI itself. The host application hands the runtime a
//! [`WarningSink`] (where cache warnings land) and a [`ProgressSink`] (the
//! "Running f()…" indicator shown around a cache miss). The defaults log
//! through `tracing` and render nothing.

use tracing::warn;

use crate::context::{self, SuppressWarningScope};

/// Warning shown when the wrapped function writes to the app surface.
///
/// Emitted (through the host's [`WarningSink`]) when a side-effect-producing
/// operation runs while a cache-miss recomputation is in flight and no
/// suppression scope is active.
pub const SIDE_EFFECT_WARNING: &str = "\
Your app writes to its UI from within a cached function. This code only runs \
on a cache miss, which can lead to unexpected results.

How to resolve this warning:
* Move the UI call outside the cached function.
* Or, if you know what you're doing, build the cached function with \
`suppress_side_effect_warning()` to silence it.";

/// Warning shown when a cached value was mutated after it was stored.
pub const MUTATED_OUTPUT_WARNING: &str = "\
Cached object mutated. The cache stores values by fingerprint, and the value \
returned for this call no longer matches the fingerprint taken when it was \
cached — something modified it in place. Return a fresh value instead, or \
build the cached function with `allow_output_mutation()` to opt out of this \
check.";

/// Receives user-visible cache warnings.
///
/// Implementations typically forward to the host's rendering surface (an
/// alert element, a notification area). Emission runs inside a
/// [`SuppressWarningScope`], so a sink that itself draws through cached
/// machinery does not recurse.
pub trait WarningSink: Send + Sync {
    fn warn(&self, message: &str);
}

/// Shows a transient "working…" indicator while a cached call executes.
///
/// `started` and `finished` calls are balanced; `finished` fires even when
/// the wrapped function panics (RAII on the caller side).
pub trait ProgressSink: Send + Sync {
    fn started(&self, message: &str);
    fn finished(&self);
}

/// Default [`WarningSink`]: logs at `warn` level, renders nothing.
#[derive(Debug, Default)]
pub struct LogWarningSink;

impl WarningSink for LogWarningSink {
    fn warn(&self, message: &str) {
        warn!(target: "muninn", "{message}");
    }
}

/// Default [`ProgressSink`]: renders nothing.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn started(&self, _message: &str) {}
    fn finished(&self) {}
}

/// Emit `message` through `sink` with recursive warnings suppressed.
pub(crate) fn warn_suppressed(sink: &dyn WarningSink, message: &str) {
    let _scope = SuppressWarningScope::enter();
    sink.warn(message);
}

/// Warn about a side effect observed inside a cached call, if appropriate.
///
/// No-op unless the current thread is inside a cache-miss recomputation
/// with no suppression scope active.
pub(crate) fn maybe_warn_side_effect(sink: &dyn WarningSink) {
    if context::within_cached_call() && !context::warnings_suppressed() {
        warn_suppressed(sink, SIDE_EFFECT_WARNING);
    }
}
