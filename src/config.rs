//! Process-wide caching switch.
//!
//! The host application owns its configuration system; muninn only needs a
//! single boolean from it. [`ConfigSource`] is the seam: the runtime consults
//! it once per call, and a `false` answer turns every cached function into a
//! direct passthrough (no tier lookup, no fingerprinting).

use std::sync::atomic::{AtomicBool, Ordering};

/// Supplies the global "is caching enabled" flag.
///
/// Implement this on the host's configuration handle to defer the decision
/// to application config. [`StaticConfig`] covers the common case of a flag
/// toggled directly at runtime.
pub trait ConfigSource: Send + Sync {
    /// Whether the caching subsystem is enabled right now.
    fn caching_enabled(&self) -> bool;
}

/// A [`ConfigSource`] backed by a single atomic flag.
///
/// This is the default source used by
/// [`MuninnBuilder`](crate::MuninnBuilder) (enabled). Keep a clone of the
/// `Arc` around to flip caching on or off while the application runs.
#[derive(Debug)]
pub struct StaticConfig {
    enabled: AtomicBool,
}

impl StaticConfig {
    /// Create a config with the given initial state.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Flip the flag at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConfigSource for StaticConfig {
    fn caching_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}
