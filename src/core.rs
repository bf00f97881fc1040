//! Core relstore functionality
//!
//! [`DataStore`] ties the worker pool to the entity caches built on top of it.

use crate::errors::RelstoreError;
use cache_system::{CacheOptions, CacheRegistry, EntityCache, EntitySource};
use config::AppConfig;
use dispatcher::Server;
use std::sync::Arc;
use table_schema::TableDefinitions;

/// Main entry point: a connected server plus the named caches over it
pub struct DataStore {
    server: Arc<Server>,
    caches: CacheRegistry,
}

impl DataStore {
    /// Validate the configuration, open the connections and start the cache registry
    pub async fn open(config: AppConfig, tables: TableDefinitions) -> Result<Self, RelstoreError> {
        config.validate()?;
        let server = Server::connect(&config.database, Arc::new(tables)).await?;
        tracing::info!(
            "data store opened on {} with {} worker(s)",
            config.database.dialect,
            server.pool().active_workers()
        );
        Ok(Self::from_server(server, &config))
    }

    /// Wrap an already running server
    pub fn from_server(server: Server, config: &AppConfig) -> Self {
        let server = Arc::new(server);
        let source: Arc<dyn EntitySource> = server.clone();
        let caches = CacheRegistry::spawn(
            source,
            CacheOptions::from_config(&config.cache),
            config.cache.aliases.clone(),
        );
        Self { server, caches }
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn tables(&self) -> &Arc<TableDefinitions> {
        self.server.tables()
    }

    /// Cache of the named table or one of its aliases
    pub async fn cache(&self, name: &str) -> Result<EntityCache, RelstoreError> {
        Ok(self.caches.get_cache(name).await?)
    }

    /// Close the caches, then the worker pool
    pub async fn close(&self) {
        if let Err(e) = self.caches.close().await {
            tracing::warn!("failed to close caches: {}", e);
        }
        self.server.close().await;
        tracing::info!("data store closed");
    }
}
