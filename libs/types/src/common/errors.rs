//! Error types for message field access and log row reconstruction

use crate::common::identifiers::MessageTypeId;
use thiserror::Error;

/// Errors raised while reading or writing message fields
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FieldError {
    /// Field name not present in the message schema
    #[error("Unknown field '{field}' in message type {type_id}")]
    UnknownField { type_id: MessageTypeId, field: String },

    /// Field exists but holds a different kind of value
    #[error("Field '{field}' is {actual}, expected {expected}")]
    WrongKind {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Array field assigned with the wrong element count
    #[error("Field '{field}' expects {expected} elements, got {got}")]
    LengthMismatch {
        field: String,
        expected: usize,
        got: usize,
    },

    /// Typed view requested for a message of another type
    #[error("Message type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: MessageTypeId,
        got: MessageTypeId,
    },

    /// Flattened row does not line up with the schema columns
    #[error("Row has {got} columns, schema '{schema}' needs {expected}")]
    ColumnCount {
        schema: String,
        expected: usize,
        got: usize,
    },

    /// Column value could not be parsed as a number
    #[error("Column '{column}' holds unparseable value '{value}'")]
    BadValue { column: String, value: String },
}

/// Result type for field operations
pub type FieldResult<T> = std::result::Result<T, FieldError>;
