use crate::command::{Command, Outcome};
use crate::pool::WorkerPool;
use crate::worker::{SessionWorker, Worker};
use config::DatabaseConfig;
use std::sync::Arc;
use std::time::Duration;
use store_object::criteria::QueryParams;
use store_object::driver::{Attributes, RecordVersion};
use store_object::{executor, DataStoreError, SaveAction, Session};
use table_schema::TableDefinitions;
use type_mapping::Dialect;

/// Typed entry point over the worker pool
pub struct Server {
    pool: WorkerPool,
    tables: Arc<TableDefinitions>,
    dialect: Dialect,
}

impl Server {
    /// Open the configured connections and start one worker per connection
    pub async fn connect(config: &DatabaseConfig, tables: Arc<TableDefinitions>) -> Result<Self, DataStoreError> {
        let url = config.connection_string();
        let timeout = Duration::from_secs(config.connection_timeout_seconds);
        let count = config.effective_connections();

        let mut workers: Vec<Box<dyn Worker>> = Vec::with_capacity(count);
        for _ in 0..count {
            match executor::connect(config.dialect, &url, timeout).await {
                Ok(conn) => {
                    let session = Session::new(conn, tables.clone(), config.postgres_inherit);
                    workers.push(Box::new(SessionWorker::new(session)));
                }
                Err(e) => {
                    tracing::error!(
                        "failed to open connection {} of {} to the {} database: {}",
                        workers.len() + 1,
                        count,
                        config.dialect,
                        e
                    );
                    for worker in workers {
                        worker.shutdown().await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self::from_workers(workers, tables, config.dialect))
    }

    /// Serve through already constructed workers
    pub fn from_workers(workers: Vec<Box<dyn Worker>>, tables: Arc<TableDefinitions>, dialect: Dialect) -> Self {
        let capacity = workers.len();
        Self {
            pool: WorkerPool::start(workers, capacity),
            tables,
            dialect,
        }
    }

    pub fn tables(&self) -> &Arc<TableDefinitions> {
        &self.tables
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub async fn call(&self, command: Command) -> Result<Outcome, DataStoreError> {
        self.pool.call(command).await
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub async fn ping(&self) -> Result<(), DataStoreError> {
        self.call(Command::Ping).await?.into_done()
    }

    pub async fn count(&self, table: &str, params: &QueryParams) -> Result<i64, DataStoreError> {
        self.call(Command::Count {
            table: table.to_string(),
            params: params.clone(),
        })
        .await?
        .into_count()
    }

    pub async fn snapshot(&self, table: &str, params: &QueryParams) -> Result<Vec<RecordVersion>, DataStoreError> {
        self.call(Command::Snapshot {
            table: table.to_string(),
            params: params.clone(),
        })
        .await?
        .into_snapshot()
    }

    pub async fn find_by_id(&self, table: &str, id: i64, includes: &str) -> Result<Attributes, DataStoreError> {
        self.call(Command::FindById {
            table: table.to_string(),
            id,
            includes: includes.to_string(),
        })
        .await?
        .into_entity()
    }

    pub async fn find(&self, table: &str, params: &QueryParams) -> Result<Vec<Attributes>, DataStoreError> {
        self.call(Command::Find {
            table: table.to_string(),
            params: params.clone(),
        })
        .await?
        .into_entities()
    }

    pub async fn children(
        &self,
        parent: &str,
        parent_id: i64,
        target: &str,
        foreign_key: &str,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        self.call(Command::Children {
            parent: parent.to_string(),
            parent_id,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
        })
        .await?
        .into_entities()
    }

    pub async fn parent(
        &self,
        child: &str,
        child_id: i64,
        target: &str,
        foreign_key: &str,
    ) -> Result<Attributes, DataStoreError> {
        self.call(Command::Parent {
            child: child.to_string(),
            child_id,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
        })
        .await?
        .into_entity()
    }

    pub async fn insert(&self, table: &str, attributes: Attributes) -> Result<i64, DataStoreError> {
        self.call(Command::Insert {
            table: table.to_string(),
            attributes,
        })
        .await?
        .into_created()
    }

    pub async fn insert_by_parent(
        &self,
        parent: &str,
        parent_id: i64,
        target: &str,
        foreign_key: &str,
        attributes: Attributes,
    ) -> Result<i64, DataStoreError> {
        self.call(Command::InsertByParent {
            parent: parent.to_string(),
            parent_id,
            target: target.to_string(),
            foreign_key: foreign_key.to_string(),
            attributes,
        })
        .await?
        .into_created()
    }

    pub async fn save(
        &self,
        table: &str,
        params: &QueryParams,
        attributes: Attributes,
    ) -> Result<(SaveAction, i64), DataStoreError> {
        self.call(Command::Save {
            table: table.to_string(),
            params: params.clone(),
            attributes,
        })
        .await?
        .into_saved()
    }

    pub async fn update(&self, table: &str, params: &QueryParams, attributes: Attributes) -> Result<u64, DataStoreError> {
        self.call(Command::Update {
            table: table.to_string(),
            params: params.clone(),
            attributes,
        })
        .await?
        .into_affected()
    }

    pub async fn update_by_id(&self, table: &str, id: i64, attributes: Attributes) -> Result<(), DataStoreError> {
        self.call(Command::UpdateById {
            table: table.to_string(),
            id,
            attributes,
        })
        .await?
        .into_done()
    }

    pub async fn delete(&self, table: &str, params: &QueryParams) -> Result<u64, DataStoreError> {
        self.call(Command::Delete {
            table: table.to_string(),
            params: params.clone(),
        })
        .await?
        .into_affected()
    }

    pub async fn delete_by_id(&self, table: &str, id: i64) -> Result<(), DataStoreError> {
        self.call(Command::DeleteById {
            table: table.to_string(),
            id,
        })
        .await?
        .into_done()
    }

    // ========================================
    // Deadline-bound reads for cache paths
    // ========================================

    pub async fn count_with_timeout(
        &self,
        table: &str,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<i64, DataStoreError> {
        let command = Command::Count {
            table: table.to_string(),
            params: params.clone(),
        };
        self.pool.call_with_timeout(command, timeout).await?.into_count()
    }

    pub async fn snapshot_with_timeout(
        &self,
        table: &str,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<Vec<RecordVersion>, DataStoreError> {
        let command = Command::Snapshot {
            table: table.to_string(),
            params: params.clone(),
        };
        self.pool.call_with_timeout(command, timeout).await?.into_snapshot()
    }

    pub async fn find_by_id_with_timeout(
        &self,
        table: &str,
        id: i64,
        includes: &str,
        timeout: Duration,
    ) -> Result<Attributes, DataStoreError> {
        let command = Command::FindById {
            table: table.to_string(),
            id,
            includes: includes.to_string(),
        };
        self.pool.call_with_timeout(command, timeout).await?.into_entity()
    }

    pub async fn find_with_timeout(
        &self,
        table: &str,
        params: &QueryParams,
        timeout: Duration,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let command = Command::Find {
            table: table.to_string(),
            params: params.clone(),
        };
        self.pool.call_with_timeout(command, timeout).await?.into_entities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Echoes the command back as a fixed outcome
    struct EchoWorker;

    #[async_trait]
    impl Worker for EchoWorker {
        async fn execute(&mut self, command: Command) -> Result<Outcome, DataStoreError> {
            Ok(match command {
                Command::Count { .. } => Outcome::Count(4),
                Command::FindById { id, .. } => {
                    Outcome::Entity(json!({"id": id}).as_object().cloned().unwrap_or_default())
                }
                Command::Save { .. } => Outcome::Saved(SaveAction::Created, 1),
                Command::Delete { .. } => Outcome::Done,
                _ => Outcome::Pong,
            })
        }

        async fn shutdown(self: Box<Self>) {}
    }

    fn server() -> Server {
        Server::from_workers(
            vec![Box::new(EchoWorker)],
            Arc::new(TableDefinitions::default()),
            Dialect::Sqlite,
        )
    }

    #[tokio::test]
    async fn test_typed_calls() {
        let server = server();
        assert_eq!(server.count("device", &QueryParams::new()).await.unwrap(), 4);
        assert_eq!(
            server.find_by_id("device", 7, "").await.unwrap().get("id"),
            Some(&json!(7))
        );
        assert_eq!(
            server
                .save("device", &QueryParams::new(), Default::default())
                .await
                .unwrap(),
            (SaveAction::Created, 1)
        );
        assert!(server.ping().await.is_ok());
        server.close().await;
    }

    #[tokio::test]
    async fn test_mismatched_outcome_is_internal() {
        let server = server();
        let err = server.delete("device", &QueryParams::new()).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        server.close().await;
    }

    #[tokio::test]
    async fn test_unsupported_dialect_fails_to_connect() {
        let config = DatabaseConfig::from_url(Dialect::MySql, "mysql://localhost/db", 2);
        let result = Server::connect(&config, Arc::new(TableDefinitions::default())).await;
        assert!(matches!(result, Err(DataStoreError::Unavailable(_))));
    }
}
