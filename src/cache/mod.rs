//! Response caching: entry store plus persistence adapter

pub mod storage;
pub mod store;

pub use storage::{DiskStorage, KeyValueStore};
pub use store::{CacheStats, CacheStore};
