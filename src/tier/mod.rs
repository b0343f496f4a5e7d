//! Cache tiers.
//!
//! Two tiers back every cached function:
//!
//! - [`memory::MemoryTier`] — bounded, time-expiring, in-process. One per
//!   cached function, held in the process-wide [`registry::TierRegistry`].
//! - [`disk::DiskTier`] — optional durable spillover, one file per call
//!   fingerprint, read through into the memory tier on cold start.
//!
//! The read/write protocol gluing them together lives in the crate's
//! orchestrator module.

pub mod disk;
pub mod memory;
pub mod registry;

pub use disk::DiskTier;
pub use memory::{CacheEntry, Clock, ManualClock, MemoryTier, SystemClock};
pub use registry::TierRegistry;
