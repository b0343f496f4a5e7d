//! Muninn — two-tier memoization for rerun-driven applications
//!
//! In a rerun-driven app the whole script re-executes on every user
//! interaction, so expensive work (I/O, data loads, transforms) would
//! repeat on every rerun. Muninn recognizes "computed before with these
//! inputs" and returns the prior result: calls are fingerprinted
//! (function identity + arguments), looked up in a bounded, time-expiring
//! in-memory tier, then optionally in a durable on-disk tier, and only
//! recomputed on a full miss. A mutation guard re-fingerprints returned
//! values to catch callers corrupting the cache through shared state, and
//! thread-local counters let the host warn when cached code writes to the
//! live UI.
//!
//! # Example
//!
//! ```rust
//! use muninn::{Muninn, fn_source};
//!
//! fn main() -> muninn::Result<()> {
//!     let muninn = Muninn::builder().build();
//!
//!     let fetch = muninn
//!         .cached(fn_source!("fetch_and_clean"), |url: &String| {
//!             // Expensive: fetch data from `url`, clean it up.
//!             format!("cleaned data from {url}")
//!         })
//!         .build()?;
//!
//!     let url = "https://example.com/data.csv".to_string();
//!     let d1 = fetch.call(&url)?; // executes the function
//!     let d2 = fetch.call(&url)?; // returns the cached value
//!     assert_eq!(d1, d2);
//!     Ok(())
//! }
//! ```
//!
//! Per-function parameters — persistence, TTL, entry bounds, mutation
//! allowance, hash overrides — live on the [`CacheBuilder`] returned by
//! [`Muninn::cached`].

pub mod cached;
pub mod config;
pub mod context;
pub mod error;
pub mod fingerprint;
mod guard;
mod orchestrator;
pub mod runtime;
pub mod surface;
pub mod telemetry;
pub mod tier;

// Re-export main types at crate root
pub use cached::{CacheBuilder, CachedFn, FnSource};
pub use config::{ConfigSource, StaticConfig};
pub use context::SuppressWarningScope;
pub use error::{MuninnError, Result};
pub use fingerprint::{Digest, Fingerprint, Fingerprinter, HashOverrides, fingerprint};
pub use runtime::{Muninn, MuninnBuilder};
pub use surface::{
    LogWarningSink, MUTATED_OUTPUT_WARNING, NoProgress, ProgressSink, SIDE_EFFECT_WARNING,
    WarningSink,
};
pub use tier::{CacheEntry, Clock, DiskTier, ManualClock, MemoryTier, SystemClock, TierRegistry};
