//! Attribute values and the attribute map held by resident entities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute name → value, ordered by name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// A single stored attribute value.
///
/// Untagged so a stored row reads as a plain JSON object
/// (`{"firstName": "Ada", "age": 36}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    Bool,
    Integer,
    Float,
    Text,
}

impl AttributeType {
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::Bool => "bool",
            AttributeType::Integer => "integer",
            AttributeType::Float => "float",
            AttributeType::Text => "text",
        }
    }

    /// Whether a non-null value fits this type. Integers are accepted for
    /// float attributes.
    pub fn accepts(self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (AttributeType::Bool, AttributeValue::Bool(_))
                | (AttributeType::Integer, AttributeValue::Integer(_))
                | (AttributeType::Float, AttributeValue::Float(_))
                | (AttributeType::Float, AttributeValue::Integer(_))
                | (AttributeType::Text, AttributeValue::Text(_))
        )
    }
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "float",
            AttributeValue::Text(_) => "text",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(n) => Some(*n),
            AttributeValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Owned text, `None` for null or non-text values.
    pub fn into_text(self) -> Option<String> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl<T> From<Option<T>> for AttributeValue
where
    T: Into<AttributeValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

/// Build an [`AttributeMap`] from `name => value` pairs.
///
/// ```ignore
/// let row = attributes! { "firstName" => "Ada", "lastName" => "Lovelace" };
/// ```
#[macro_export]
macro_rules! attributes {
    () => {
        $crate::AttributeMap::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::AttributeMap::new();
        $(map.insert(::std::string::String::from($name), $crate::AttributeValue::from($value));)+
        map
    }};
}
