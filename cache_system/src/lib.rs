//! Per-table entity caches
//!
//! Each cached table is served by one [`EntityCache`] actor that loads
//! entities on first access and periodically evicts the ones whose row
//! version changed. [`CacheRegistry`] creates the caches lazily by name.

pub mod entity_cache;
pub mod matcher;
pub mod options;
pub mod prelude;
pub mod registry;
pub mod source;

// Re-export centralized config
pub use config::CacheConfig;

pub use entity_cache::{CacheStatus, EntityCache};
pub use matcher::Matcher;
pub use options::CacheOptions;
pub use registry::CacheRegistry;
pub use source::EntitySource;

#[cfg(test)]
pub(crate) mod mock;
