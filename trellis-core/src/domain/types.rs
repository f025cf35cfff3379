//! Semantic port types
//!
//! Every template port and pipeline parameter declares a `PortType`. The
//! compiler only ever checks structural compatibility between them; it never
//! looks inside the values an execution engine passes between steps.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Semantic type of a port or parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PortType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Map,
    /// Untyped port, compatible with everything
    #[default]
    Any,
    /// Domain type carried as a string at run time (e.g. `GCSPath`, `Model`)
    Named(String),
}

/// Error returned when raw text cannot be coerced into a typed value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot read '{raw}' as {expected}")]
pub struct ValueParseError {
    pub expected: PortType,
    pub raw: String,
}

impl PortType {
    /// Parse a type name
    ///
    /// Builtin names are matched case-insensitively and accept the usual
    /// aliases (`int`, `bool`, `dict`, ...). An empty name means `Any`;
    /// anything else becomes a named domain type.
    pub fn parse(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => PortType::String,
            "integer" | "int" => PortType::Integer,
            "float" | "number" | "double" => PortType::Float,
            "boolean" | "bool" => PortType::Boolean,
            "list" | "array" => PortType::List,
            "map" | "dict" | "object" | "jsonobject" => PortType::Map,
            "" | "any" => PortType::Any,
            _ => PortType::Named(trimmed.to_string()),
        }
    }

    /// Named domain type, normalized through [`PortType::parse`]
    pub fn named(name: impl AsRef<str>) -> Self {
        PortType::parse(name.as_ref())
    }

    /// Canonical name used in serialized documents
    pub fn name(&self) -> &str {
        match self {
            PortType::String => "String",
            PortType::Integer => "Integer",
            PortType::Float => "Float",
            PortType::Boolean => "Boolean",
            PortType::List => "List",
            PortType::Map => "Map",
            PortType::Any => "Any",
            PortType::Named(name) => name,
        }
    }

    /// Whether a value of type `self` may flow into a port of type `dest`
    pub fn is_assignable_to(&self, dest: &PortType) -> bool {
        match (self, dest) {
            (a, b) if a == b => true,
            (PortType::Any, _) | (_, PortType::Any) => true,
            (PortType::Integer, PortType::Float) => true,
            (PortType::Named(_), PortType::String) | (PortType::String, PortType::Named(_)) => {
                true
            }
            _ => false,
        }
    }

    /// Whether a literal JSON value fits this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PortType::Any => true,
            PortType::String | PortType::Named(_) => value.is_string(),
            PortType::Integer => value.is_i64() || value.is_u64(),
            PortType::Float => value.is_number(),
            PortType::Boolean => value.is_boolean(),
            PortType::List => value.is_array(),
            PortType::Map => value.is_object(),
        }
    }

    /// Coerce raw command-line text into a value of this type
    ///
    /// # Example
    /// ```
    /// use trellis_core::domain::types::PortType;
    ///
    /// let value = PortType::Float.parse_value("0.001")?;
    /// assert_eq!(value, serde_json::json!(0.001));
    /// # Ok::<(), trellis_core::domain::types::ValueParseError>(())
    /// ```
    pub fn parse_value(&self, raw: &str) -> Result<Value, ValueParseError> {
        let fail = || ValueParseError {
            expected: self.clone(),
            raw: raw.to_string(),
        };

        match self {
            PortType::String | PortType::Named(_) => Ok(Value::String(raw.to_string())),
            PortType::Integer => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| fail()),
            PortType::Float => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(fail),
            PortType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            PortType::List | PortType::Map => {
                let value: Value = serde_json::from_str(raw).map_err(|_| fail())?;
                if self.accepts(&value) {
                    Ok(value)
                } else {
                    Err(fail())
                }
            }
            PortType::Any => {
                Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
            }
        }
    }
}

/// Short name of a JSON value's shape, used in error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PortType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PortType::parse(s))
    }
}

impl Serialize for PortType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for PortType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(PortType::parse(&name))
    }
}
