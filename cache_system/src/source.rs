use async_trait::async_trait;
use dispatcher::Server;
use std::time::Duration;
use store_object::criteria::QueryParams;
use store_object::driver::{Attributes, RecordVersion};
use store_object::DataStoreError;

/// Where a cache loads entities and row versions from
#[async_trait]
pub trait EntitySource: Send + Sync + 'static {
    async fn find_by_id_with_includes(
        &self,
        table: &str,
        id: i64,
        includes: &str,
        timeout: Duration,
    ) -> Result<Attributes, DataStoreError>;

    async fn find_all_with_includes(
        &self,
        table: &str,
        includes: &str,
        timeout: Duration,
    ) -> Result<Vec<Attributes>, DataStoreError>;

    async fn snapshot(&self, table: &str, timeout: Duration) -> Result<Vec<RecordVersion>, DataStoreError>;

    async fn count(&self, table: &str, timeout: Duration) -> Result<i64, DataStoreError>;
}

#[async_trait]
impl EntitySource for Server {
    async fn find_by_id_with_includes(
        &self,
        table: &str,
        id: i64,
        includes: &str,
        timeout: Duration,
    ) -> Result<Attributes, DataStoreError> {
        self.find_by_id_with_timeout(table, id, includes, timeout).await
    }

    async fn find_all_with_includes(
        &self,
        table: &str,
        includes: &str,
        timeout: Duration,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let mut params = QueryParams::new();
        if !includes.is_empty() {
            params.push("includes", includes);
        }
        self.find_with_timeout(table, &params, timeout).await
    }

    async fn snapshot(&self, table: &str, timeout: Duration) -> Result<Vec<RecordVersion>, DataStoreError> {
        self.snapshot_with_timeout(table, &QueryParams::new(), timeout).await
    }

    async fn count(&self, table: &str, timeout: Duration) -> Result<i64, DataStoreError> {
        self.count_with_timeout(table, &QueryParams::new(), timeout).await
    }
}
