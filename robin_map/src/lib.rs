//! [RobinMap] is a hash map from `u32` keys to arbitrary values, using open addressing with Robin
//! Hood probing.
//!
//! All entries live in a single power-of-two sized slot buffer. On collision, an entry that
//! travelled further from its home slot takes the slot from one that travelled less, which keeps
//! the variance of probe lengths low and lets lookups stop as soon as they have walked further
//! than the entry in the slot they are looking at.
//!
//! Removal marks slots as tombstones instead of shifting entries back. Tombstones keep the probe
//! chains of other entries intact and are reused by later insertions. The table rebuilds itself
//! when it runs full, when it becomes sparse, and when tombstones pile up.
//!
//! Keys are mixed by a [`BuildHasher`](std::hash::BuildHasher), which defaults to the
//! deterministic [`zwohash::ZwoHasher`].

mod error;
mod raw;
mod stats;
mod util;

pub use error::TableError;
pub use raw::{MAX_SIZE_EXP, MIN_SIZE_EXP};
pub use robin_map::RobinMap;
pub use stats::TableStats;

pub mod robin_map;

#[cfg(test)]
mod test_map;
