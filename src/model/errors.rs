//! Model error types

use thiserror::Error;

use super::types::AttrType;

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Model declaration and encoding errors
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Attribute is not declared on the model
    #[error("unknown attribute '{attribute}' on model '{model}'")]
    UnknownAttribute { model: String, attribute: String },

    /// Value type does not match the declared attribute type
    #[error("attribute '{attribute}' expects {expected} but got {got}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        got: &'static str,
    },

    /// Stored field could not be decoded as the declared type
    #[error("cannot decode '{value}' as {expected}")]
    Decode { expected: &'static str, value: String },

    /// Duplicate attribute name in a model declaration
    #[error("attribute '{attribute}' declared more than once")]
    DuplicateAttribute { attribute: String },
}

impl ModelError {
    /// Create a type mismatch error
    pub fn type_mismatch(attribute: impl Into<String>, expected: AttrType, got: AttrType) -> Self {
        Self::TypeMismatch {
            attribute: attribute.into(),
            expected: expected.type_name(),
            got: got.type_name(),
        }
    }
}
