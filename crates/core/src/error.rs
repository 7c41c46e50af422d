//! Model error type.

use thiserror::Error;

/// Result type used for entity-kind validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Model-level error.
///
/// Raised when an attribute name or value does not fit the fixed shape of an
/// entity kind, or when an identifier cannot be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The kind declares no attribute with this name.
    #[error("unknown attribute '{attribute}' for kind '{kind}'")]
    UnknownAttribute { kind: String, attribute: String },

    /// A value does not have the declared attribute type.
    #[error("attribute '{attribute}' expects {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A required attribute was null or missing.
    #[error("attribute '{attribute}' is required")]
    MissingValue { attribute: String },

    /// An entity kind declaration is malformed.
    #[error("invalid kind: {0}")]
    InvalidKind(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl ModelError {
    pub fn unknown_attribute(kind: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::UnknownAttribute {
            kind: kind.into(),
            attribute: attribute.into(),
        }
    }

    pub fn missing(attribute: impl Into<String>) -> Self {
        Self::MissingValue {
            attribute: attribute.into(),
        }
    }

    pub fn invalid_kind(msg: impl Into<String>) -> Self {
        Self::InvalidKind(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
