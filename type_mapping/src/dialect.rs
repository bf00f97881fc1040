//! SQL dialect selection
//!
//! The dialect is resolved once from the configured driver name and decides
//! placeholder style, LIMIT/OFFSET rendering and a few capability flags.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Sqlite,
    MySql,
    MsSql,
    Oracle,
    Generic,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
            Dialect::MySql => "mysql",
            Dialect::MsSql => "mssql",
            Dialect::Oracle => "oracle",
            Dialect::Generic => "generic",
        }
    }

    /// `$1, $2, ...` instead of `?`
    pub fn numbered_placeholders(&self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Oracle)
    }

    pub fn placeholder(&self, index: usize) -> String {
        if self.numbered_placeholders() {
            format!("${}", index)
        } else {
            "?".to_string()
        }
    }

    pub fn supports_returning(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// `FROM ONLY` / `UPDATE ONLY` for native table inheritance
    pub fn supports_only(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Storage engines that allow a single writer connection
    pub fn is_single_writer(&self) -> bool {
        matches!(self, Dialect::Sqlite)
    }

    /// Render the trailing LIMIT/OFFSET clause, with a leading space
    pub fn render_limit_offset(&self, limit: i64, offset: Option<i64>) -> String {
        match self {
            Dialect::Postgres => match offset {
                Some(offset) => format!(" LIMIT {} OFFSET {}", limit, offset),
                None => format!(" LIMIT {}", limit),
            },
            Dialect::MsSql | Dialect::Oracle => format!(
                " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                offset.unwrap_or(0),
                limit
            ),
            Dialect::Sqlite | Dialect::MySql | Dialect::Generic => match offset {
                Some(offset) => format!(" LIMIT {} , {}", offset, limit),
                None => format!(" LIMIT {}", limit),
            },
        }
    }
}

/// Quote a string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "mysql" | "mymysql" => Ok(Dialect::MySql),
            "mssql" | "sqlserver" | "odbc_with_mssql" => Ok(Dialect::MsSql),
            "oracle" | "oci8" => Ok(Dialect::Oracle),
            "generic" => Ok(Dialect::Generic),
            other => Err(format!("unsupported database driver '{}'", other)),
        }
    }
}

impl Serialize for Dialect {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?");
    }

    #[test]
    fn test_limit_offset_rendering() {
        assert_eq!(Dialect::Postgres.render_limit_offset(10, Some(5)), " LIMIT 10 OFFSET 5");
        assert_eq!(Dialect::Postgres.render_limit_offset(10, None), " LIMIT 10");
        assert_eq!(Dialect::Sqlite.render_limit_offset(10, Some(5)), " LIMIT 5 , 10");
        assert_eq!(Dialect::MySql.render_limit_offset(10, None), " LIMIT 10");
        assert_eq!(
            Dialect::MsSql.render_limit_offset(10, None),
            " OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }

    #[test]
    fn test_driver_names() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("sqlite3".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert!("mongo".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("o'neil"), "'o''neil'");
    }
}
