//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `tier` — cache tier that produced the event: "memory" or "disk"

/// Total cache hits.
///
/// Labels: `tier` ("memory" | "disk").
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses (both tiers exhausted, underlying function ran).
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total reads that found a cached value mutated since it was written.
///
/// These are soft hits: the mutated value is returned after a warning.
pub const MUTATED_READS_TOTAL: &str = "muninn_mutated_reads_total";

/// Total disk tier write failures.
///
/// The in-memory write still succeeds; the value is simply not persisted.
pub const PERSIST_ERRORS_TOTAL: &str = "muninn_persist_errors_total";
