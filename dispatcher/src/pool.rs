//! Fixed-size worker pool
//!
//! Workers share one bounded queue. A command runs under `catch_unwind`,
//! so a panicking command is answered with an internal error and the worker
//! keeps serving. The active count drops only when a worker task exits.

use crate::command::{Command, Outcome};
use crate::worker::Worker;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use store_object::DataStoreError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

type Reply = oneshot::Sender<Result<Outcome, DataStoreError>>;

enum Message {
    Work { command: Command, reply: Reply },
    Stop,
}

pub struct WorkerPool {
    sender: mpsc::Sender<Message>,
    active: Arc<AtomicUsize>,
    closed: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn one task per worker. Must be called inside a tokio runtime.
    pub fn start(workers: Vec<Box<dyn Worker>>, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let active = Arc::new(AtomicUsize::new(workers.len()));

        let handles = workers
            .into_iter()
            .enumerate()
            .map(|(index, worker)| tokio::spawn(run_worker(index, worker, receiver.clone(), active.clone())))
            .collect::<Vec<_>>();

        tracing::info!("worker pool started with {} worker(s)", handles.len());
        Self {
            sender,
            active,
            closed: AtomicBool::new(false),
            handles: Mutex::new(handles),
        }
    }

    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn submit(&self, command: Command) -> Result<oneshot::Receiver<Result<Outcome, DataStoreError>>, DataStoreError> {
        if self.is_closed() || self.active_workers() == 0 {
            return Err(unavailable());
        }
        let (reply, receiver) = oneshot::channel();
        self.sender
            .send(Message::Work { command, reply })
            .await
            .map_err(|_| unavailable())?;
        Ok(receiver)
    }

    /// Run a command and wait for its reply without a deadline
    pub async fn call(&self, command: Command) -> Result<Outcome, DataStoreError> {
        let receiver = self.submit(command).await?;
        receiver.await.map_err(|_| reply_dropped())?
    }

    /// Run a command; queueing and execution together must finish in time
    pub async fn call_with_timeout(&self, command: Command, timeout: Duration) -> Result<Outcome, DataStoreError> {
        let name = command.name();
        let waiting = async {
            let receiver = self.submit(command).await?;
            receiver.await.map_err(|_| reply_dropped())?
        };
        match tokio::time::timeout(timeout, waiting).await {
            Ok(result) => result,
            Err(_) => Err(DataStoreError::Timeout(format!(
                "'{}' is not finished after {:?}",
                name, timeout
            ))),
        }
    }

    /// Stop every worker after the queued work and wait for them to exit.
    /// Calling it again does nothing.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let handles = std::mem::take(&mut *self.handles.lock().await);
        for _ in 0..handles.len() {
            if self.sender.send(Message::Stop).await.is_err() {
                break;
            }
        }
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("worker task failed to join: {}", e);
            }
        }
        tracing::info!("worker pool closed");
    }
}

fn unavailable() -> DataStoreError {
    DataStoreError::Unavailable("worker pool is closed".to_string())
}

fn reply_dropped() -> DataStoreError {
    DataStoreError::InternalServerError("reply of the worker is dropped".to_string())
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

async fn run_worker(
    index: usize,
    mut worker: Box<dyn Worker>,
    receiver: Arc<Mutex<mpsc::Receiver<Message>>>,
    active: Arc<AtomicUsize>,
) {
    loop {
        let message = receiver.lock().await.recv().await;
        let (command, reply) = match message {
            Some(Message::Work { command, reply }) => (command, reply),
            Some(Message::Stop) | None => break,
        };

        let name = command.name();
        store_object::trace_log!("[WORKER {}] {}", index, name);
        let result = match AssertUnwindSafe(worker.execute(command)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(
                    "worker {} panicked while executing '{}': {}\ncaught at:\n{}",
                    index,
                    name,
                    message,
                    Backtrace::force_capture()
                );
                Err(DataStoreError::InternalServerError(format!(
                    "worker panicked while executing '{}': {}",
                    name, message
                )))
            }
        };
        // the caller may have given up waiting
        let _ = reply.send(result);
    }

    worker.shutdown().await;
    active.fetch_sub(1, Ordering::SeqCst);
    tracing::info!("worker {} stopped", index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Answers pings, panics on count and sleeps on snapshot
    struct MockWorker {
        executed: Arc<AtomicUsize>,
        stopped: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Worker for MockWorker {
        async fn execute(&mut self, command: Command) -> Result<Outcome, DataStoreError> {
            self.executed.fetch_add(1, Ordering::SeqCst);
            match command {
                Command::Count { .. } => panic!("boom"),
                Command::Snapshot { .. } => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(Outcome::Snapshot(vec![]))
                }
                _ => Ok(Outcome::Pong),
            }
        }

        async fn shutdown(self: Box<Self>) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool(size: usize) -> (WorkerPool, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let executed = Arc::new(AtomicUsize::new(0));
        let stopped = Arc::new(AtomicUsize::new(0));
        let workers = (0..size)
            .map(|_| {
                Box::new(MockWorker {
                    executed: executed.clone(),
                    stopped: stopped.clone(),
                }) as Box<dyn Worker>
            })
            .collect();
        (WorkerPool::start(workers, size), executed, stopped)
    }

    fn count() -> Command {
        Command::Count {
            table: "device".into(),
            params: Default::default(),
        }
    }

    // ========================================
    // Calls
    // ========================================

    #[tokio::test]
    async fn test_call_returns_outcome() {
        let (pool, executed, _) = pool(2);
        for _ in 0..5 {
            assert_eq!(pool.call(Command::Ping).await.unwrap(), Outcome::Pong);
        }
        assert_eq!(executed.load(Ordering::SeqCst), 5);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_panic_is_reported_and_worker_survives() {
        let (pool, _, _) = pool(1);
        let err = pool.call(count()).await.unwrap_err();
        assert!(matches!(err, DataStoreError::InternalServerError(msg) if msg.contains("boom")));

        assert_eq!(pool.active_workers(), 1);
        assert_eq!(pool.call(Command::Ping).await.unwrap(), Outcome::Pong);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_call_with_timeout() {
        let (pool, _, _) = pool(1);
        let snapshot = Command::Snapshot {
            table: "device".into(),
            params: Default::default(),
        };
        let err = pool
            .call_with_timeout(snapshot, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, DataStoreError::Timeout(_)));

        let reply = pool
            .call_with_timeout(Command::Ping, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply, Outcome::Pong);
        pool.close().await;
    }

    // ========================================
    // Close
    // ========================================

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let (pool, _, stopped) = pool(3);
        pool.close().await;

        assert_eq!(pool.active_workers(), 0);
        assert_eq!(stopped.load(Ordering::SeqCst), 3);
        let err = pool.call(Command::Ping).await.unwrap_err();
        assert!(matches!(err, DataStoreError::Unavailable(_)));
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let (pool, _, stopped) = pool(2);
        pool.close().await;
        pool.close().await;
        assert_eq!(stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_pool_is_unavailable() {
        let pool = WorkerPool::start(Vec::new(), 1);
        assert!(matches!(
            pool.call(Command::Ping).await,
            Err(DataStoreError::Unavailable(_))
        ));
    }
}
