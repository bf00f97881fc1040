//! Column definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use type_mapping::{Collection, ColumnType, SqlValue, TypeError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub collection: Collection,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_readonly: bool,
    #[serde(default)]
    pub is_serial: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

impl ColumnDefinition {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            collection: Collection::Scalar,
            is_required: false,
            is_readonly: false,
            is_serial: false,
            default_value: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.is_readonly = true;
        self
    }

    pub fn serial(mut self) -> Self {
        self.is_serial = true;
        self
    }

    pub fn array(mut self) -> Self {
        self.collection = Collection::Array;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Type used to decode the stored value; arrays are stored as JSON text
    pub fn storage_type(&self) -> ColumnType {
        match self.collection {
            Collection::Scalar => self.column_type,
            Collection::Array => ColumnType::String,
        }
    }

    pub fn parse(&self, s: &str) -> Result<SqlValue, TypeError> {
        self.column_type.parse(s)
    }

    pub fn to_internal(&self, value: &Value) -> Result<SqlValue, TypeError> {
        match self.collection {
            Collection::Scalar => self.column_type.to_internal(value),
            Collection::Array => match value {
                Value::Null => Err(TypeError::Absent),
                Value::Array(items) => {
                    let normalized = items
                        .iter()
                        .map(|item| {
                            self.column_type
                                .to_internal(item)
                                .map(|v| self.column_type.to_external(&v))
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(SqlValue::Text(Value::Array(normalized).to_string()))
                }
                other => Err(TypeError::invalid("array", other)),
            },
        }
    }

    pub fn to_external(&self, value: &SqlValue) -> Value {
        match (self.collection, value) {
            (Collection::Array, SqlValue::Text(s)) => {
                serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.clone()))
            }
            _ => self.column_type.to_external(value),
        }
    }
}
