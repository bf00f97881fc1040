//! Validation module
//!
//! Identifiers coming from metadata end up inside generated SQL, so every
//! table, collection and column name is checked once when the registry is
//! built. The clause checks guard the raw `group_by`/`order` fragments.

use std::fmt;

/// Validation errors for database identifiers
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name contains invalid characters (only alphanumeric and underscore allowed)
    InvalidCharacters(String),
    /// Name is too long (PostgreSQL limit is 63 characters)
    TooLong {
        name: String,
        length: usize,
        max_length: usize,
    },
    /// Name is empty
    Empty,
    /// Name starts with invalid character (must start with letter or underscore)
    InvalidStartCharacter(String),
    /// Name is a reserved SQL keyword
    ReservedKeyword(String),
    /// Clause contains something other than column references
    InvalidClause(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidCharacters(name) => {
                write!(f, "Invalid characters in name '{}': only alphanumeric characters and underscores are allowed", name)
            }
            ValidationError::TooLong {
                name,
                length,
                max_length,
            } => {
                write!(
                    f,
                    "Name '{}' is too long: {} characters (max {})",
                    name, length, max_length
                )
            }
            ValidationError::Empty => write!(f, "Name cannot be empty"),
            ValidationError::InvalidStartCharacter(name) => {
                write!(f, "Name '{}' must start with a letter or underscore", name)
            }
            ValidationError::ReservedKeyword(name) => {
                write!(f, "Name '{}' is a reserved SQL keyword", name)
            }
            ValidationError::InvalidClause(clause) => {
                write!(f, "Clause '{}' may only list columns separated by commas", clause)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// PostgreSQL identifier length limit
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

const RESERVED_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "JOIN", "ON", "AS", "AND", "OR",
    "NOT", "NULL", "TRUE", "FALSE", "IN", "LIKE", "BETWEEN", "ORDER", "BY", "GROUP", "HAVING",
    "LIMIT", "OFFSET", "UNION", "CREATE", "DROP", "ALTER", "TABLE", "ONLY", "RETURNING",
];

/// Check a table, collection or column name
pub fn validate_identifier(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::Empty);
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            name: name.to_string(),
            length: name.len(),
            max_length: MAX_IDENTIFIER_LENGTH,
        });
    }

    let first_char = name.chars().next().ok_or(ValidationError::Empty)?;
    if !first_char.is_ascii_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidStartCharacter(name.to_string()));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::InvalidCharacters(name.to_string()));
    }

    if RESERVED_KEYWORDS.contains(&name.to_ascii_uppercase().as_str()) {
        return Err(ValidationError::ReservedKeyword(name.to_string()));
    }

    Ok(())
}

/// Check a `group_by` / `order` list such as `name DESC, t.id`
pub fn validate_column_list(clause: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidClause(clause.to_string());
    for item in clause.split(',') {
        let mut words = item.split_whitespace();
        let column = words.next().ok_or_else(invalid)?;
        let plain = column
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        if !plain {
            return Err(invalid());
        }
        match words.next() {
            None => {}
            Some(dir) if dir.eq_ignore_ascii_case("asc") || dir.eq_ignore_ascii_case("desc") => {}
            Some(_) => return Err(invalid()),
        }
        if words.next().is_some() {
            return Err(invalid());
        }
    }
    Ok(())
}

/// Reject statement separators and comments in a raw `having` expression
pub fn validate_expression(clause: &str) -> Result<(), ValidationError> {
    if clause.contains(';') || clause.contains("--") || clause.contains("/*") {
        return Err(ValidationError::InvalidClause(clause.to_string()));
    }
    Ok(())
}
