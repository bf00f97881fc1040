//! Named caches created on first use

use crate::entity_cache::{EntityCache, MAILBOX_CAPACITY};
use crate::options::CacheOptions;
use crate::source::EntitySource;
use std::collections::HashMap;
use std::sync::Arc;
use store_object::DataStoreError;
use tokio::sync::{mpsc, oneshot};

enum Message {
    Get {
        target: String,
        reply: oneshot::Sender<Result<EntityCache, DataStoreError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the registry actor
#[derive(Clone)]
pub struct CacheRegistry {
    sender: mpsc::Sender<Message>,
    aliases: Arc<HashMap<String, String>>,
    options: CacheOptions,
}

impl CacheRegistry {
    pub fn spawn(source: Arc<dyn EntitySource>, options: CacheOptions, aliases: HashMap<String, String>) -> Self {
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = RegistryActor {
            source,
            options: options.clone(),
            caches: HashMap::new(),
        };
        tokio::spawn(actor.run(receiver));

        Self {
            sender,
            aliases: Arc::new(aliases),
            options,
        }
    }

    /// Resolve an alias to the table it stands for
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    async fn request<T>(&self, message: impl FnOnce(oneshot::Sender<T>) -> Message) -> Result<T, DataStoreError> {
        let (reply, receiver) = oneshot::channel();
        let timeout = self.options.request_timeout;
        let waiting = async move {
            self.sender
                .send(message(reply))
                .await
                .map_err(|_| DataStoreError::Unavailable("cache registry is closed".to_string()))?;
            receiver.await.map_err(|_| {
                DataStoreError::InternalServerError("cache registry dropped the reply".to_string())
            })
        };
        match tokio::time::timeout(timeout, waiting).await {
            Ok(result) => result,
            Err(_) => Err(DataStoreError::Timeout(format!(
                "cache registry did not answer after {:?}",
                timeout
            ))),
        }
    }

    /// Cache of the named table, started on first request
    pub async fn get_cache(&self, name: &str) -> Result<EntityCache, DataStoreError> {
        if name.is_empty() {
            return Err(DataStoreError::Validation("cache name is empty.".to_string()));
        }
        let target = self.resolve(name).to_string();
        self.request(|reply| Message::Get { target, reply }).await?
    }

    /// Close every cache, then the registry itself
    pub async fn close(&self) -> Result<(), DataStoreError> {
        self.request(|reply| Message::Close { reply }).await
    }
}

struct RegistryActor {
    source: Arc<dyn EntitySource>,
    options: CacheOptions,
    caches: HashMap<String, EntityCache>,
}

impl RegistryActor {
    async fn run(mut self, mut receiver: mpsc::Receiver<Message>) {
        while let Some(message) = receiver.recv().await {
            match message {
                Message::Get { target, reply } => {
                    let _ = reply.send(self.get_or_create(target).await);
                }
                Message::Close { reply } => {
                    receiver.close();
                    for (name, cache) in self.caches.drain() {
                        if let Err(e) = cache.close().await {
                            tracing::warn!("failed to close cache '{}': {}", name, e);
                        }
                    }
                    let _ = reply.send(());
                    break;
                }
            }
        }
        tracing::info!("cache registry stopped");
    }

    async fn get_or_create(&mut self, target: String) -> Result<EntityCache, DataStoreError> {
        if let Some(cache) = self.caches.get(&target) {
            return Ok(cache.clone());
        }

        match self.source.count(&target, self.options.request_timeout).await {
            Ok(_) => {}
            Err(DataStoreError::NotFound(e)) => {
                return Err(DataStoreError::NotFound(format!(
                    "table '{}' is not found: {}",
                    target, e
                )));
            }
            Err(e) => return Err(e.with_context(&format!("failed to start cache '{}'", target))),
        }

        tracing::info!("starting cache '{}'", target);
        let cache = EntityCache::spawn(self.source.clone(), target.clone(), self.options.clone());
        self.caches.insert(target, cache.clone());
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSource, BUSY_TABLE};
    use std::sync::atomic::Ordering;

    fn registry(source: &Arc<MockSource>) -> CacheRegistry {
        let aliases = HashMap::from([("dev".to_string(), "device".to_string())]);
        CacheRegistry::spawn(source.clone(), CacheOptions::default(), aliases)
    }

    #[tokio::test]
    async fn test_caches_are_created_once() {
        let source = Arc::new(MockSource::new());
        let registry = registry(&source);

        let first = registry.get_cache("device").await.unwrap();
        let aliased = registry.get_cache("dev").await.unwrap();
        assert_eq!(first.target(), "device");
        assert_eq!(aliased.target(), "device");
        assert_eq!(source.counts.load(Ordering::SeqCst), 1);

        first.get(2).await.unwrap();
        assert!(aliased.find(2).await.unwrap().is_some());
        registry.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_table_is_not_found() {
        let source = Arc::new(MockSource::new());
        let registry = registry(&source);

        let err = registry.get_cache("printer").await.unwrap_err();
        assert!(err.is_not_found());
        let err = registry.get_cache("").await.unwrap_err();
        assert!(matches!(err, DataStoreError::Validation(_)));

        // a failed lookup is retried on the next request
        registry.get_cache("printer").await.unwrap_err();
        assert_eq!(source.counts.load(Ordering::SeqCst), 2);
        registry.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_count_failures_keep_their_kind() {
        let source = Arc::new(MockSource::new());
        let registry = registry(&source);

        let err = registry.get_cache(BUSY_TABLE).await.unwrap_err();
        assert!(matches!(err, DataStoreError::Timeout(_)));
        assert_eq!(err.status_code(), 504);
        registry.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_stops_every_cache() {
        let source = Arc::new(MockSource::new());
        let registry = registry(&source);
        let device = registry.get_cache("device").await.unwrap();
        let interface = registry.get_cache("interface").await.unwrap();

        registry.close().await.unwrap();
        assert!(matches!(device.get(1).await, Err(DataStoreError::Unavailable(_))));
        assert!(matches!(interface.status().await, Err(DataStoreError::Unavailable(_))));
        assert!(matches!(
            registry.get_cache("device").await,
            Err(DataStoreError::Unavailable(_))
        ));
    }
}
