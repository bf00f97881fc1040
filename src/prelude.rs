//! Convenience re-exports for common relstore usage
//!
//! # Example
//!
//! ```rust
//! use relstore::prelude::*;
//! ```

// Core relstore components
pub use crate::core::DataStore;
pub use crate::errors::RelstoreError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig};

// Re-export commonly used store-object types for convenience
pub use store_object::prelude::*;

// Worker pool
pub use dispatcher::{Command, Outcome, Server};

// Re-export cache system
pub use cache_system::prelude::{CacheOptions, CacheRegistry, CacheStatus, EntityCache, EntitySource, Matcher};

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use serde_json;
pub use sqlx;
pub use tokio;
