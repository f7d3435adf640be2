//! Frame-level errors for encoding and decoding telemetry messages
//!
//! Every decode error is per-frame: the receiver logs it and moves on to the
//! next frame. None of these variants indicate a broken link.

use thiserror::Error;
use types::{FieldError, MessageTypeId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// Buffer is too small to hold the structure being read
    #[error("Frame too small: need {need} bytes, got {got} ({context})")]
    TooShort {
        need: usize,
        got: usize,
        context: &'static str,
    },

    /// Leading magic byte did not match
    #[error("Invalid magic byte: expected {expected:#04x}, got {actual:#04x}")]
    InvalidMagic { expected: u8, actual: u8 },

    /// Trailing checksum did not match the frame contents
    #[error("Checksum mismatch: frame says {expected:#010x}, calculated {calculated:#010x} ({frame_len} bytes)")]
    ChecksumMismatch {
        expected: u32,
        calculated: u32,
        frame_len: usize,
    },

    /// No schema registered for this message type
    #[error("Unknown message type {0}")]
    UnknownMessageType(MessageTypeId),

    /// Payload longer than the schema allows
    #[error("Payload for message type {type_id} is {got} bytes, schema allows at most {max}")]
    PayloadTooLong {
        type_id: MessageTypeId,
        max: usize,
        got: usize,
    },

    /// A field value cannot be represented in its wire type
    #[error("Cannot encode field '{field}': {reason}")]
    Unencodable { field: String, reason: String },

    #[error(transparent)]
    Field(#[from] FieldError),
}

impl CodecError {
    pub fn too_short(need: usize, got: usize, context: &'static str) -> Self {
        Self::TooShort { need, got, context }
    }

    pub fn unencodable(field: &str, reason: impl Into<String>) -> Self {
        Self::Unencodable {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;
