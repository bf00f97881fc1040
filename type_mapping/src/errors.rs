//! Error types for value conversion

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    /// The value is intentionally absent (JSON null or SQL NULL)
    #[error("value is absent")]
    Absent,

    #[error("'{value}' is not a valid {type_name}")]
    Invalid { type_name: &'static str, value: String },
}

impl TypeError {
    pub fn invalid(type_name: &'static str, value: impl ToString) -> Self {
        TypeError::Invalid {
            type_name,
            value: value.to_string(),
        }
    }
}
