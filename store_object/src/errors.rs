use table_schema::SchemaError;
use thiserror::Error;
use type_mapping::TypeError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataStoreError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Association error: {0}")]
    Association(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("{}", format_cascade(.0))]
    Cascade(Vec<DataStoreError>),
}

fn format_cascade(errors: &[DataStoreError]) -> String {
    let details = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} cascade failure(s): {}", errors.len(), details)
}

impl DataStoreError {
    /// Status code class at the HTTP boundary
    pub fn status_code(&self) -> u16 {
        match self {
            DataStoreError::Validation(_)
            | DataStoreError::UnsupportedOperator(_)
            | DataStoreError::Association(_) => 400,
            DataStoreError::NotFound(_) => 404,
            DataStoreError::Conflict(_) => 409,
            DataStoreError::Unavailable(_) => 503,
            DataStoreError::Timeout(_) => 504,
            DataStoreError::Database(_)
            | DataStoreError::InternalServerError(_)
            | DataStoreError::Cascade(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataStoreError::NotFound(_))
    }

    /// Prefix the message while keeping the kind
    pub fn with_context(self, context: &str) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            DataStoreError::Validation(m) => DataStoreError::Validation(wrap(m)),
            DataStoreError::UnsupportedOperator(m) => DataStoreError::UnsupportedOperator(wrap(m)),
            DataStoreError::NotFound(m) => DataStoreError::NotFound(wrap(m)),
            DataStoreError::Conflict(m) => DataStoreError::Conflict(wrap(m)),
            DataStoreError::Association(m) => DataStoreError::Association(wrap(m)),
            DataStoreError::Timeout(m) => DataStoreError::Timeout(wrap(m)),
            DataStoreError::Unavailable(m) => DataStoreError::Unavailable(wrap(m)),
            DataStoreError::Database(m) => DataStoreError::Database(wrap(m)),
            DataStoreError::InternalServerError(m) => DataStoreError::InternalServerError(wrap(m)),
            DataStoreError::Cascade(errors) => DataStoreError::Cascade(
                errors.into_iter().map(|e| e.with_context(context)).collect(),
            ),
        }
    }
}

impl From<sqlx::Error> for DataStoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataStoreError::NotFound("no rows in result set".to_string()),
            sqlx::Error::PoolTimedOut => DataStoreError::Timeout(err.to_string()),
            // 42P01 is undefined_table on Postgres
            sqlx::Error::Database(db)
                if db.code().as_deref() == Some("42P01") || db.message().starts_with("no such table") =>
            {
                DataStoreError::NotFound(db.message().to_string())
            }
            other => DataStoreError::Database(other.to_string()),
        }
    }
}

impl From<TypeError> for DataStoreError {
    fn from(err: TypeError) -> Self {
        DataStoreError::Validation(err.to_string())
    }
}

impl From<SchemaError> for DataStoreError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::UnknownTable(_) => DataStoreError::NotFound(err.to_string()),
            SchemaError::AssociationNotFound { .. } | SchemaError::AmbiguousAssociation { .. } => {
                DataStoreError::Association(err.to_string())
            }
            other => DataStoreError::InternalServerError(other.to_string()),
        }
    }
}
