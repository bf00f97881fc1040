//! Worker pool over connection-bound sessions
//!
//! Each worker owns one physical connection through a [`Session`] and runs
//! the [`Command`]s it takes from a shared bounded queue, one at a time.
//! [`Server`] opens the connections and exposes typed calls.
//!
//! [`Session`]: store_object::Session

pub mod command;
pub mod pool;
pub mod server;
pub mod worker;

// Re-export the main public types for convenience
pub use command::{Command, Outcome};
pub use pool::WorkerPool;
pub use server::Server;
pub use worker::{SessionWorker, Worker};
