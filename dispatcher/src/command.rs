use store_object::criteria::QueryParams;
use store_object::driver::{Attributes, RecordVersion};
use store_object::{DataStoreError, SaveAction};

/// One unit of work for a session-bound worker
#[derive(Debug, Clone)]
pub enum Command {
    Count {
        table: String,
        params: QueryParams,
    },
    Snapshot {
        table: String,
        params: QueryParams,
    },
    FindById {
        table: String,
        id: i64,
        includes: String,
    },
    Find {
        table: String,
        params: QueryParams,
    },
    Children {
        parent: String,
        parent_id: i64,
        target: String,
        foreign_key: String,
    },
    Parent {
        child: String,
        child_id: i64,
        target: String,
        foreign_key: String,
    },
    Insert {
        table: String,
        attributes: Attributes,
    },
    InsertByParent {
        parent: String,
        parent_id: i64,
        target: String,
        foreign_key: String,
        attributes: Attributes,
    },
    Save {
        table: String,
        params: QueryParams,
        attributes: Attributes,
    },
    Update {
        table: String,
        params: QueryParams,
        attributes: Attributes,
    },
    UpdateById {
        table: String,
        id: i64,
        attributes: Attributes,
    },
    Delete {
        table: String,
        params: QueryParams,
    },
    DeleteById {
        table: String,
        id: i64,
    },
    Ping,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Count { .. } => "count",
            Command::Snapshot { .. } => "snapshot",
            Command::FindById { .. } => "find_by_id",
            Command::Find { .. } => "find",
            Command::Children { .. } => "children",
            Command::Parent { .. } => "parent",
            Command::Insert { .. } => "insert",
            Command::InsertByParent { .. } => "insert_by_parent",
            Command::Save { .. } => "save",
            Command::Update { .. } => "update",
            Command::UpdateById { .. } => "update_by_id",
            Command::Delete { .. } => "delete",
            Command::DeleteById { .. } => "delete_by_id",
            Command::Ping => "ping",
        }
    }
}

/// Reply to a [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Count(i64),
    Snapshot(Vec<RecordVersion>),
    Entity(Attributes),
    Entities(Vec<Attributes>),
    Created(i64),
    Saved(SaveAction, i64),
    Affected(u64),
    Done,
    Pong,
}

impl Outcome {
    fn unexpected(self, wanted: &str) -> DataStoreError {
        DataStoreError::InternalServerError(format!(
            "unexpected outcome, want {}, got {:?}",
            wanted, self
        ))
    }

    pub fn into_count(self) -> Result<i64, DataStoreError> {
        match self {
            Outcome::Count(n) => Ok(n),
            other => Err(other.unexpected("count")),
        }
    }

    pub fn into_snapshot(self) -> Result<Vec<RecordVersion>, DataStoreError> {
        match self {
            Outcome::Snapshot(versions) => Ok(versions),
            other => Err(other.unexpected("snapshot")),
        }
    }

    pub fn into_entity(self) -> Result<Attributes, DataStoreError> {
        match self {
            Outcome::Entity(entity) => Ok(entity),
            other => Err(other.unexpected("entity")),
        }
    }

    pub fn into_entities(self) -> Result<Vec<Attributes>, DataStoreError> {
        match self {
            Outcome::Entities(entities) => Ok(entities),
            other => Err(other.unexpected("entities")),
        }
    }

    pub fn into_created(self) -> Result<i64, DataStoreError> {
        match self {
            Outcome::Created(id) => Ok(id),
            other => Err(other.unexpected("created")),
        }
    }

    pub fn into_saved(self) -> Result<(SaveAction, i64), DataStoreError> {
        match self {
            Outcome::Saved(action, id) => Ok((action, id)),
            other => Err(other.unexpected("saved")),
        }
    }

    pub fn into_affected(self) -> Result<u64, DataStoreError> {
        match self {
            Outcome::Affected(n) => Ok(n),
            other => Err(other.unexpected("affected")),
        }
    }

    pub fn into_done(self) -> Result<(), DataStoreError> {
        match self {
            Outcome::Done | Outcome::Pong => Ok(()),
            other => Err(other.unexpected("done")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_conversions() {
        assert_eq!(Outcome::Count(3).into_count().unwrap(), 3);
        assert_eq!(
            Outcome::Saved(SaveAction::Updated, 9).into_saved().unwrap(),
            (SaveAction::Updated, 9)
        );
        assert!(Outcome::Pong.into_done().is_ok());

        let err = Outcome::Affected(1).into_count().unwrap_err();
        assert!(matches!(err, DataStoreError::InternalServerError(msg) if msg.contains("want count")));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Ping.name(), "ping");
        let command = Command::DeleteById {
            table: "device".into(),
            id: 1,
        };
        assert_eq!(command.name(), "delete_by_id");
    }
}
