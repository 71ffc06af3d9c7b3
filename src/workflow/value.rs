/// Typed configuration and metadata values
///
/// Every value carries its wire type name so the persistence codec can rebuild it
/// without knowing the component's schema. The wire names are the fully-qualified
/// names used by existing workflow files.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data types supported for configuration values, metadata and dynamic endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
}

impl DataType {
    /// All supported types, used for endpoint type validation
    pub const ALL: [DataType; 5] = [
        DataType::String,
        DataType::Integer,
        DataType::Long,
        DataType::Double,
        DataType::Boolean,
    ];

    /// Fully-qualified name written to persisted documents
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String => "java.lang.String",
            DataType::Integer => "java.lang.Integer",
            DataType::Long => "java.lang.Long",
            DataType::Double => "java.lang.Double",
            DataType::Boolean => "java.lang.Boolean",
        }
    }

    /// Resolve a fully-qualified type name; `None` for unsupported types
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.type_name() == name)
    }

    /// Parse a stringified value of this type
    ///
    /// Returns `None` when the text is not a valid literal for the type.
    /// Booleans follow lenient parsing: anything but "true" (ignoring case) is false.
    pub fn parse_value(&self, raw: &str) -> Option<ConfigValue> {
        match self {
            DataType::String => Some(ConfigValue::String(raw.to_string())),
            DataType::Integer => raw.trim().parse().ok().map(ConfigValue::Integer),
            DataType::Long => raw.trim().parse().ok().map(ConfigValue::Long),
            DataType::Double => raw.trim().parse().ok().map(ConfigValue::Double),
            DataType::Boolean => Some(ConfigValue::Boolean(raw.eq_ignore_ascii_case("true"))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A typed configuration or metadata value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum ConfigValue {
    String(String),
    Integer(i32),
    Long(i64),
    Double(f64),
    Boolean(bool),
}

impl ConfigValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ConfigValue::String(_) => DataType::String,
            ConfigValue::Integer(_) => DataType::Integer,
            ConfigValue::Long(_) => DataType::Long,
            ConfigValue::Double(_) => DataType::Double,
            ConfigValue::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::String(v) => f.write_str(v),
            ConfigValue::Integer(v) => write!(f, "{v}"),
            ConfigValue::Long(v) => write!(f, "{v}"),
            ConfigValue::Double(v) => write!(f, "{v:?}"),
            ConfigValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Long(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Double(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_resolve_both_ways() {
        for t in DataType::ALL {
            assert_eq!(DataType::from_type_name(t.type_name()), Some(t));
        }
        assert_eq!(DataType::from_type_name("java.util.Date"), None);
    }

    #[test]
    fn numbers_keep_their_type_through_text() {
        let v = ConfigValue::Double(3.0);
        assert_eq!(v.to_string(), "3.0");
        assert_eq!(DataType::Double.parse_value(&v.to_string()), Some(v));
        assert_eq!(DataType::Integer.parse_value("12x"), None);
        assert_eq!(
            DataType::Boolean.parse_value("TRUE"),
            Some(ConfigValue::Boolean(true))
        );
    }
}
