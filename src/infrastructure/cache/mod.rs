//! Caching implementations

pub mod blob_store;
pub mod file_cache;

pub use blob_store::{BlobStore, FsBlobStore};
pub use file_cache::{cache_key, CacheStats, VulnCache, COMPRESSION_THRESHOLD_BYTES, DEFAULT_TTL};
