//! Result cache in front of propagation and analytics outputs.

pub mod keys;
pub mod result_cache;

pub use keys::{glob_match, CacheNamespace};
pub use result_cache::{CacheEntry, CacheStats, ResultCache};
