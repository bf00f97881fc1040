use crate::command::{Command, Outcome};
use async_trait::async_trait;
use store_object::{DataStoreError, Session};

/// Executes commands against one connection, strictly in sequence
#[async_trait]
pub trait Worker: Send + 'static {
    async fn execute(&mut self, command: Command) -> Result<Outcome, DataStoreError>;

    /// Release the connection; called once when the worker stops
    async fn shutdown(self: Box<Self>);
}

pub struct SessionWorker {
    session: Session,
}

impl SessionWorker {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Worker for SessionWorker {
    async fn execute(&mut self, command: Command) -> Result<Outcome, DataStoreError> {
        let session = &mut self.session;
        match command {
            Command::Count { table, params } => session.count(&table, &params).await.map(Outcome::Count),
            Command::Snapshot { table, params } => {
                session.snapshot(&table, &params).await.map(Outcome::Snapshot)
            }
            Command::FindById {
                table,
                id,
                includes,
            } => session
                .find_by_id(&table, id, &includes)
                .await
                .map(Outcome::Entity),
            Command::Find { table, params } => session.find(&table, &params).await.map(Outcome::Entities),
            Command::Children {
                parent,
                parent_id,
                target,
                foreign_key,
            } => session
                .children(&parent, parent_id, &target, &foreign_key)
                .await
                .map(Outcome::Entities),
            Command::Parent {
                child,
                child_id,
                target,
                foreign_key,
            } => session
                .parent(&child, child_id, &target, &foreign_key)
                .await
                .map(Outcome::Entity),
            Command::Insert { table, attributes } => {
                session.insert(&table, attributes).await.map(Outcome::Created)
            }
            Command::InsertByParent {
                parent,
                parent_id,
                target,
                foreign_key,
                attributes,
            } => session
                .insert_by_parent(&parent, parent_id, &target, &foreign_key, attributes)
                .await
                .map(Outcome::Created),
            Command::Save {
                table,
                params,
                attributes,
            } => session
                .save(&table, &params, attributes)
                .await
                .map(|(action, id)| Outcome::Saved(action, id)),
            Command::Update {
                table,
                params,
                attributes,
            } => session
                .update(&table, &params, &attributes)
                .await
                .map(Outcome::Affected),
            Command::UpdateById {
                table,
                id,
                attributes,
            } => session
                .update_by_id(&table, id, &attributes)
                .await
                .map(|_| Outcome::Done),
            Command::Delete { table, params } => session.delete(&table, &params).await.map(Outcome::Affected),
            Command::DeleteById { table, id } => session.delete_by_id(&table, id).await.map(|_| Outcome::Done),
            Command::Ping => Ok(Outcome::Pong),
        }
    }

    async fn shutdown(self: Box<Self>) {
        if let Err(e) = self.session.close().await {
            tracing::warn!("failed to close session connection: {}", e);
        }
    }
}
