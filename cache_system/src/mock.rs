//! In-memory entity source for cache tests

use crate::source::EntitySource;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use store_object::driver::{Attributes, RecordVersion};
use store_object::DataStoreError;
use tokio::sync::Semaphore;

pub(crate) const PANIC_ID: i64 = 13;
pub(crate) const SLOW_ID: i64 = 99;
/// Table whose count always times out
pub(crate) const BUSY_TABLE: &str = "busy";

pub(crate) fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
}

/// Serves `device` rows; `PANIC_ID` panics and `SLOW_ID` sleeps
pub(crate) struct MockSource {
    pub loads: AtomicUsize,
    pub snapshots: AtomicUsize,
    pub counts: AtomicUsize,
    pub versions: Mutex<Vec<RecordVersion>>,
    /// Snapshots wait for a permit when set
    pub gate: Option<Semaphore>,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            loads: AtomicUsize::new(0),
            snapshots: AtomicUsize::new(0),
            counts: AtomicUsize::new(0),
            versions: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn entity(id: i64) -> Attributes {
        let stamp = created().to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);
        json!({
            "id": id,
            "type": "Device",
            "created_at": stamp,
            "updated_at": stamp,
            "$interface": [
                {"id": id * 10, "if_index": 1, "status": "up"},
                {"id": id * 10 + 1, "if_index": 2, "status": "down"}
            ]
        })
        .as_object()
        .cloned()
        .unwrap_or_default()
    }

    pub fn version(id: i64) -> RecordVersion {
        RecordVersion {
            id,
            created_at: Some(created()),
            updated_at: Some(created()),
        }
    }
}

#[async_trait]
impl EntitySource for MockSource {
    async fn find_by_id_with_includes(
        &self,
        table: &str,
        id: i64,
        _includes: &str,
        _timeout: Duration,
    ) -> Result<Attributes, DataStoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if id == PANIC_ID {
            panic!("corrupted row {}", id);
        }
        if id == SLOW_ID {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        if id < 0 {
            return Err(DataStoreError::NotFound(format!(
                "record with id '{}' is not found in the '{}'",
                id, table
            )));
        }
        Ok(Self::entity(id))
    }

    async fn find_all_with_includes(
        &self,
        _table: &str,
        _includes: &str,
        _timeout: Duration,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        Ok((1..=3).map(Self::entity).collect())
    }

    async fn snapshot(&self, _table: &str, _timeout: Duration) -> Result<Vec<RecordVersion>, DataStoreError> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| DataStoreError::Unavailable(e.to_string()))?;
        }
        Ok(self.versions.lock().unwrap().clone())
    }

    async fn count(&self, table: &str, _timeout: Duration) -> Result<i64, DataStoreError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        if table == "device" || table == "interface" {
            Ok(3)
        } else if table == BUSY_TABLE {
            Err(DataStoreError::Timeout(format!("count of '{}' did not answer", table)))
        } else {
            Err(DataStoreError::NotFound(format!("table '{}' is not found", table)))
        }
    }
}
