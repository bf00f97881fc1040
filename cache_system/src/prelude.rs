//! Convenience re-exports for common cache-system usage

// Core cache system components
pub use crate::entity_cache::{CacheStatus, EntityCache};
pub use crate::matcher::Matcher;
pub use crate::options::CacheOptions;
pub use crate::registry::CacheRegistry;
pub use crate::source::EntitySource;

// Re-export centralized config
pub use config::CacheConfig;

// Common external dependencies
pub use async_trait::async_trait;
pub use serde_json;
pub use tokio;
