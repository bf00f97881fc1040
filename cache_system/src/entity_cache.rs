//! Single-table entity cache actor
//!
//! All state lives in one task that owns the entry map. Handles talk to it
//! through a bounded mailbox. Row versions are checked in a detached task so
//! a slow snapshot never blocks lookups.

use crate::matcher::{filter_children, Matcher};
use crate::options::CacheOptions;
use crate::source::EntitySource;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use store_object::driver::{Attributes, RecordVersion};
use store_object::DataStoreError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use type_mapping::validate::parse_datetime;

pub const MAILBOX_CAPACITY: usize = 5;

type Reply<T> = oneshot::Sender<Result<T, DataStoreError>>;

enum Message {
    Get {
        id: i64,
        reply: Reply<Attributes>,
    },
    Children {
        id: i64,
        child_type: String,
        matchers: Vec<(String, Matcher)>,
        reply: Reply<Vec<Attributes>>,
    },
    LoadAll {
        reply: Reply<Vec<Attributes>>,
    },
    Find {
        id: i64,
        reply: oneshot::Sender<Option<Attributes>>,
    },
    Set {
        id: i64,
        entity: Attributes,
        reply: oneshot::Sender<()>,
    },
    Delete {
        id: i64,
        reply: oneshot::Sender<bool>,
    },
    Refresh(Vec<RecordVersion>),
    RefreshDone,
    Tick,
    Status {
        reply: oneshot::Sender<CacheStatus>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

impl Message {
    fn name(&self) -> &'static str {
        match self {
            Message::Get { .. } => "get",
            Message::Children { .. } => "children",
            Message::LoadAll { .. } => "load_all",
            Message::Find { .. } => "find",
            Message::Set { .. } => "set",
            Message::Delete { .. } => "delete",
            Message::Refresh(_) => "refresh",
            Message::RefreshDone => "refresh_done",
            Message::Tick => "tick",
            Message::Status { .. } => "status",
            Message::Close { .. } => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub target: String,
    pub entries: usize,
    pub is_refreshing: bool,
}

/// Handle to a running cache; clones share the same actor
#[derive(Debug, Clone)]
pub struct EntityCache {
    target: String,
    sender: mpsc::Sender<Message>,
    request_timeout: Duration,
}

impl EntityCache {
    /// Start the actor for `target`. Must be called inside a tokio runtime.
    pub fn spawn(source: Arc<dyn EntitySource>, target: impl Into<String>, options: CacheOptions) -> Self {
        let target = target.into();
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        let request_timeout = options.request_timeout;

        let actor = CacheActor {
            target: target.clone(),
            source,
            options,
            entries: HashMap::new(),
            is_refreshing: false,
            mailbox: sender.downgrade(),
        };
        tokio::spawn(actor.run(receiver));

        Self {
            target,
            sender,
            request_timeout,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    async fn request<T>(&self, message: impl FnOnce(oneshot::Sender<T>) -> Message) -> Result<T, DataStoreError> {
        let (reply, receiver) = oneshot::channel();
        let waiting = async move {
            self.sender.send(message(reply)).await.map_err(|_| {
                DataStoreError::Unavailable(format!("cache '{}' is closed", self.target))
            })?;
            receiver.await.map_err(|_| {
                DataStoreError::InternalServerError(format!("cache '{}' dropped the reply", self.target))
            })
        };
        match tokio::time::timeout(self.request_timeout, waiting).await {
            Ok(result) => result,
            Err(_) => Err(DataStoreError::Timeout(format!(
                "cache '{}' did not answer after {:?}",
                self.target, self.request_timeout
            ))),
        }
    }

    /// Cached entity, loaded from the source on a miss
    pub async fn get(&self, id: i64) -> Result<Attributes, DataStoreError> {
        self.request(|reply| Message::Get { id, reply }).await?
    }

    /// Embedded `$child_type` entries of the entity that satisfy every matcher
    pub async fn children(
        &self,
        id: i64,
        child_type: &str,
        matchers: Vec<(String, Matcher)>,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let child_type = child_type.to_string();
        self.request(|reply| Message::Children {
            id,
            child_type,
            matchers,
            reply,
        })
        .await?
    }

    /// Every row of the target with the cache includes; the results replace
    /// the cached entries of the same ids
    pub async fn load_all(&self) -> Result<Vec<Attributes>, DataStoreError> {
        self.request(|reply| Message::LoadAll { reply }).await?
    }

    /// Cached entity without touching the source
    pub async fn find(&self, id: i64) -> Result<Option<Attributes>, DataStoreError> {
        self.request(|reply| Message::Find { id, reply }).await
    }

    pub async fn set(&self, id: i64, entity: Attributes) -> Result<(), DataStoreError> {
        self.request(|reply| Message::Set { id, entity, reply }).await
    }

    /// Evict one entry; returns whether it was cached
    pub async fn remove(&self, id: i64) -> Result<bool, DataStoreError> {
        self.request(|reply| Message::Delete { id, reply }).await
    }

    /// Check row versions now instead of waiting for the timer
    pub async fn trigger_refresh(&self) -> Result<(), DataStoreError> {
        self.sender
            .send(Message::Tick)
            .await
            .map_err(|_| DataStoreError::Unavailable(format!("cache '{}' is closed", self.target)))
    }

    pub async fn status(&self) -> Result<CacheStatus, DataStoreError> {
        self.request(|reply| Message::Status { reply }).await
    }

    /// Stop the actor once the messages queued before this one are handled
    pub async fn close(&self) -> Result<(), DataStoreError> {
        self.request(|reply| Message::Close { reply }).await
    }
}

struct CacheActor {
    target: String,
    source: Arc<dyn EntitySource>,
    options: CacheOptions,
    entries: HashMap<i64, Attributes>,
    is_refreshing: bool,
    mailbox: mpsc::WeakSender<Message>,
}

impl CacheActor {
    async fn run(mut self, mut receiver: mpsc::Receiver<Message>) {
        let period = self.options.refresh_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let message = tokio::select! {
                _ = ticker.tick() => Message::Tick,
                received = receiver.recv() => match received {
                    Some(message) => message,
                    None => break,
                },
            };

            if let Message::Close { reply } = message {
                receiver.close();
                let _ = reply.send(());
                break;
            }

            let name = message.name();
            if let Err(panic) = AssertUnwindSafe(self.handle(message)).catch_unwind().await {
                tracing::error!(
                    "cache '{}' panicked while handling '{}': {}\ncaught at:\n{}",
                    self.target,
                    name,
                    panic_message(panic.as_ref()),
                    Backtrace::force_capture()
                );
            }
        }

        tracing::info!("cache '{}' stopped with {} entries", self.target, self.entries.len());
    }

    async fn handle(&mut self, message: Message) {
        match message {
            Message::Get { id, reply } => {
                let _ = reply.send(self.load(id).await);
            }
            Message::Children {
                id,
                child_type,
                matchers,
                reply,
            } => {
                let result = self.load(id).await.map(|entity| {
                    let key = if child_type.starts_with('$') {
                        child_type
                    } else {
                        format!("${}", child_type)
                    };
                    filter_children(entity.get(&key), &matchers)
                });
                let _ = reply.send(result);
            }
            Message::LoadAll { reply } => {
                let _ = reply.send(self.load_all().await);
            }
            Message::Find { id, reply } => {
                let _ = reply.send(self.entries.get(&id).cloned());
            }
            Message::Set { id, entity, reply } => {
                self.entries.insert(id, entity);
                let _ = reply.send(());
            }
            Message::Delete { id, reply } => {
                let _ = reply.send(self.entries.remove(&id).is_some());
            }
            Message::Tick => self.start_refresh(),
            Message::Refresh(snapshot) => self.compare(&snapshot),
            Message::RefreshDone => self.is_refreshing = false,
            Message::Status { reply } => {
                let _ = reply.send(CacheStatus {
                    target: self.target.clone(),
                    entries: self.entries.len(),
                    is_refreshing: self.is_refreshing,
                });
            }
            // handled by the loop
            Message::Close { reply } => {
                let _ = reply.send(());
            }
        }
    }

    async fn load(&mut self, id: i64) -> Result<Attributes, DataStoreError> {
        if let Some(entity) = self.entries.get(&id) {
            return Ok(entity.clone());
        }

        store_object::trace_log!("cache '{}' misses id {}", self.target, id);
        let entity = self
            .source
            .find_by_id_with_includes(&self.target, id, &self.options.includes, self.options.request_timeout)
            .await?;
        self.entries.insert(id, entity.clone());
        Ok(entity)
    }

    async fn load_all(&mut self) -> Result<Vec<Attributes>, DataStoreError> {
        let entities = self
            .source
            .find_all_with_includes(&self.target, &self.options.includes, self.options.request_timeout)
            .await?;
        for entity in &entities {
            if let Some(id) = entity.get("id").and_then(Value::as_i64) {
                self.entries.insert(id, entity.clone());
            }
        }
        Ok(entities)
    }

    fn start_refresh(&mut self) {
        if self.is_refreshing {
            store_object::trace_log!("cache '{}' is already refreshing", self.target);
            return;
        }
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        self.is_refreshing = true;

        let source = self.source.clone();
        let target = self.target.clone();
        let timeout = self.options.request_timeout;
        tokio::spawn(async move {
            match source.snapshot(&target, timeout).await {
                Ok(snapshot) => {
                    let _ = mailbox.send(Message::Refresh(snapshot)).await;
                }
                Err(e) => tracing::warn!("failed to refresh cache '{}': {}", target, e),
            }
            let _ = mailbox.send(Message::RefreshDone).await;
        });
    }

    /// Evict entries whose row version changed or whose row is gone
    fn compare(&mut self, snapshot: &[RecordVersion]) {
        let versions: HashMap<i64, &RecordVersion> = snapshot.iter().map(|v| (v.id, v)).collect();
        let _before = self.entries.len();
        self.entries.retain(|id, entity| {
            versions
                .get(id)
                .is_some_and(|version| is_current(entity, version))
        });
        store_object::debug_log!(
            "cache '{}' evicted {} of {} entries",
            self.target,
            _before - self.entries.len(),
            _before
        );
    }
}

fn timestamp(entity: &Attributes, name: &str) -> Option<DateTime<Utc>> {
    entity.get(name).and_then(Value::as_str).and_then(parse_datetime)
}

fn is_current(entity: &Attributes, version: &RecordVersion) -> bool {
    timestamp(entity, "created_at") == version.created_at && timestamp(entity, "updated_at") == version.updated_at
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
