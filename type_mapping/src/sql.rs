//! SQL type conversion utilities
//!
//! This module handles conversion between attribute values (JSON), criteria
//! strings and the internal `SqlValue` bound into statements.

use crate::errors::TypeError;
use crate::types::SqlValue;
use crate::validate::{is_ip_address, is_physical_address, parse_bool, parse_datetime};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Semantic column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    ObjectId,
    Integer,
    Decimal,
    String,
    Boolean,
    DateTime,
    IpAddress,
    PhysicalAddress,
}

/// Column arity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    #[default]
    Scalar,
    Array,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ColumnType {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::ObjectId => "objectId",
            ColumnType::Integer => "integer",
            ColumnType::Decimal => "decimal",
            ColumnType::String => "string",
            ColumnType::Boolean => "boolean",
            ColumnType::DateTime => "datetime",
            ColumnType::IpAddress => "ipAddress",
            ColumnType::PhysicalAddress => "physicalAddress",
        }
    }

    /// Values rendered as quoted literals inside `IN ( ... )`
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ColumnType::String | ColumnType::IpAddress | ColumnType::PhysicalAddress
        )
    }

    /// Values rendered bare inside `IN ( ... )`
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnType::ObjectId | ColumnType::Integer | ColumnType::Decimal
        )
    }

    /// Parse a criteria string into an internal value
    pub fn parse(&self, s: &str) -> Result<SqlValue, TypeError> {
        let invalid = || TypeError::invalid(self.name(), s);
        match self {
            ColumnType::ObjectId | ColumnType::Integer => {
                s.trim().parse::<i64>().map(SqlValue::Integer).map_err(|_| invalid())
            }
            ColumnType::Decimal => s.trim().parse::<f64>().map(SqlValue::Decimal).map_err(|_| invalid()),
            ColumnType::String => Ok(SqlValue::Text(s.to_string())),
            ColumnType::Boolean => parse_bool(s).map(SqlValue::Boolean).ok_or_else(invalid),
            ColumnType::DateTime => parse_datetime(s).map(SqlValue::Timestamp).ok_or_else(invalid),
            ColumnType::IpAddress => {
                if is_ip_address(s) {
                    Ok(SqlValue::Text(s.to_string()))
                } else {
                    Err(invalid())
                }
            }
            ColumnType::PhysicalAddress => {
                if is_physical_address(s) {
                    Ok(SqlValue::Text(s.to_string()))
                } else {
                    Err(invalid())
                }
            }
        }
    }

    /// Convert an attribute value into an internal value.
    ///
    /// JSON `null` reports [`TypeError::Absent`] so callers can skip the column.
    pub fn to_internal(&self, value: &Value) -> Result<SqlValue, TypeError> {
        let invalid = || TypeError::invalid(self.name(), value);
        match (self, value) {
            (_, Value::Null) => Err(TypeError::Absent),
            (_, Value::String(s)) => self.parse(s),
            (ColumnType::ObjectId | ColumnType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(SqlValue::Integer)
                .ok_or_else(invalid),
            (ColumnType::Decimal, Value::Number(n)) => {
                n.as_f64().map(SqlValue::Decimal).ok_or_else(invalid)
            }
            (ColumnType::String, Value::Number(n)) => Ok(SqlValue::Text(n.to_string())),
            (ColumnType::String, Value::Bool(b)) => Ok(SqlValue::Text(b.to_string())),
            (ColumnType::Boolean, Value::Bool(b)) => Ok(SqlValue::Boolean(*b)),
            (ColumnType::Boolean, Value::Number(n)) => match n.as_i64() {
                Some(0) => Ok(SqlValue::Boolean(false)),
                Some(1) => Ok(SqlValue::Boolean(true)),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    /// Convert an internal value into its attribute representation
    pub fn to_external(&self, value: &SqlValue) -> Value {
        match (self, value) {
            (_, SqlValue::Null) => Value::Null,
            (ColumnType::Boolean, SqlValue::Integer(i)) => Value::Bool(*i != 0),
            (_, SqlValue::Boolean(b)) => Value::Bool(*b),
            (_, SqlValue::Integer(i)) => Value::from(*i),
            (_, SqlValue::Decimal(d)) => serde_json::Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            (_, SqlValue::Text(s)) => Value::String(s.clone()),
            (_, SqlValue::Timestamp(t)) => {
                Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ========================================
    // parse
    // ========================================

    #[test]
    fn test_parse_integer_and_decimal() {
        assert_eq!(ColumnType::Integer.parse("12").unwrap(), SqlValue::Integer(12));
        assert_eq!(ColumnType::ObjectId.parse(" 7 ").unwrap(), SqlValue::Integer(7));
        assert_eq!(ColumnType::Decimal.parse("1.5").unwrap(), SqlValue::Decimal(1.5));
        assert!(matches!(
            ColumnType::Integer.parse("abc"),
            Err(TypeError::Invalid { type_name: "integer", .. })
        ));
    }

    #[test]
    fn test_parse_addresses() {
        assert!(ColumnType::IpAddress.parse("10.0.0.1").is_ok());
        assert!(ColumnType::IpAddress.parse("10.0.0").is_err());
        assert!(ColumnType::PhysicalAddress.parse("aa:bb:cc:dd:ee:ff").is_ok());
        assert!(ColumnType::PhysicalAddress.parse("aa:bb").is_err());
    }

    // ========================================
    // to_internal / to_external
    // ========================================

    #[test]
    fn test_null_is_absent() {
        assert_eq!(ColumnType::String.to_internal(&Value::Null), Err(TypeError::Absent));
    }

    #[test]
    fn test_to_internal_accepts_strings_and_numbers() {
        assert_eq!(ColumnType::Integer.to_internal(&json!(3)).unwrap(), SqlValue::Integer(3));
        assert_eq!(ColumnType::Integer.to_internal(&json!("3")).unwrap(), SqlValue::Integer(3));
        assert_eq!(ColumnType::Integer.to_internal(&json!(3.0)).unwrap(), SqlValue::Integer(3));
        assert!(ColumnType::Integer.to_internal(&json!(3.5)).is_err());
        assert_eq!(ColumnType::String.to_internal(&json!(42)).unwrap(), SqlValue::Text("42".into()));
        assert_eq!(ColumnType::Boolean.to_internal(&json!(1)).unwrap(), SqlValue::Boolean(true));
        assert!(ColumnType::Boolean.to_internal(&json!([true])).is_err());
    }

    #[test]
    fn test_datetime_round_trip_is_stable() {
        let internal = ColumnType::DateTime
            .to_internal(&json!("2024-05-06T07:08:09.123456Z"))
            .unwrap();
        let external = ColumnType::DateTime.to_external(&internal);
        assert_eq!(external, json!("2024-05-06T07:08:09.123456Z"));
    }

    #[test]
    fn test_boolean_stored_as_integer() {
        assert_eq!(ColumnType::Boolean.to_external(&SqlValue::Integer(0)), json!(false));
        assert_eq!(ColumnType::Integer.to_external(&SqlValue::Integer(0)), json!(0));
    }
}
