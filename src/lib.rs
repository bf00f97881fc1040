//! # relstore
//!
//! A relational data-access engine: dynamic tables described at runtime,
//! single and class table inheritance, association cascades, a worker pool
//! with one connection per worker and per-table entity caches.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relstore::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tables = TableDefinitionsBuilder::new()
//!         .table(TableBuilder::new("Device").timestamps()
//!             .column(ColumnDefinition::new("name", ColumnType::String))
//!             .association(Association::has_many("interface", "device_id")))
//!         .table(TableBuilder::new("Interface")
//!             .column(ColumnDefinition::new("device_id", ColumnType::Integer)))
//!         .build()?;
//!
//!     let config = AppConfig::load()?;
//!     let store = DataStore::open(config, tables).await?;
//!
//!     let attributes = serde_json::json!({
//!         "name": "edge-1",
//!         "$interface": [{"if_index": 1}, {"if_index": 2}]
//!     });
//!     let id = store
//!         .server()
//!         .insert("device", attributes.as_object().cloned().unwrap_or_default())
//!         .await?;
//!
//!     let cache = store.cache("device").await?;
//!     println!("{:?}", cache.get(id).await?);
//!
//!     store.close().await;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use core::DataStore;
pub use errors::RelstoreError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig};

// Re-export internal crates used by the public API
pub use cache_system;
pub use dispatcher;
pub use store_object;
pub use table_schema;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
