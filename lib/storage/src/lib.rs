//! Precomputed feature storage for featx
//!
//! [`MemoryStore`] keeps point-in-time history per source and join keys and
//! serves it to the engine through [`featx_core::FeatureLookup`].

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::{SnapshotEntry, SnapshotStats};
