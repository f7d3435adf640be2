//! # Message Field Schemas
//!
//! A [`MessageSchema`] is the codec-provided description of one message
//! type: its numeric id, its name and the ordered list of fields with
//! their wire kinds and lengths.
//!
//! The runtime never interprets wire layouts itself. It uses schemas for
//! two things: name-based field access on decoded [`Message`]s and the
//! flattened column layout of the append-only persistence log.
//!
//! ## Flattened columns
//!
//! ```text
//! timestamp | scalar | text | array_0 | array_1 | ... | array_{n-1}
//! ```
//!
//! Scalars and fixed-length text take one column each; numeric arrays take
//! one column per element with a `_<index>` suffix.
//!
//! [`Message`]: crate::protocol::message::Message

use crate::common::identifiers::MessageTypeId;
use serde::{Deserialize, Serialize};

/// Column name of the arrival timestamp in flattened rows
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Primitive wire type of a field element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// Fixed-length, NUL-padded text
    Char,
}

impl FieldKind {
    /// Encoded size of one element in bytes
    pub const fn size(self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 | FieldKind::Char => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::U64 | FieldKind::I64 | FieldKind::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::U8 => "u8",
            FieldKind::I8 => "i8",
            FieldKind::U16 => "u16",
            FieldKind::I16 => "i16",
            FieldKind::U32 => "u32",
            FieldKind::I32 => "i32",
            FieldKind::U64 => "u64",
            FieldKind::I64 => "i64",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::Char => "char",
        }
    }
}

/// One named field of a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Element count; 1 for scalars, string capacity for text
    pub len: usize,
}

impl FieldSpec {
    pub fn scalar(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            len: 1,
        }
    }

    pub fn array(name: &str, kind: FieldKind, len: usize) -> Self {
        Self {
            name: name.to_string(),
            kind,
            len,
        }
    }

    pub fn text(name: &str, len: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Char,
            len,
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == FieldKind::Char
    }

    pub fn is_array(&self) -> bool {
        !self.is_text() && self.len > 1
    }

    /// Encoded size in bytes
    pub fn wire_size(&self) -> usize {
        self.kind.size() * self.len
    }

    /// Number of flattened log columns this field occupies
    pub fn column_count(&self) -> usize {
        if self.is_array() {
            self.len
        } else {
            1
        }
    }

    /// Flattened column names, suffixed per element for arrays
    pub fn column_names(&self) -> Vec<String> {
        if self.is_array() {
            (0..self.len).map(|i| format!("{}_{}", self.name, i)).collect()
        } else {
            vec![self.name.clone()]
        }
    }
}

/// Ordered field layout of one message type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSchema {
    pub type_id: MessageTypeId,
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl MessageSchema {
    pub fn new(type_id: impl Into<MessageTypeId>, name: &str, fields: Vec<FieldSpec>) -> Self {
        Self {
            type_id: type_id.into(),
            name: name.to_string(),
            fields,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Total encoded payload size in bytes
    pub fn payload_len(&self) -> usize {
        self.fields.iter().map(FieldSpec::wire_size).sum()
    }

    /// Header row of the persistence log, timestamp first
    pub fn columns(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_COLUMN.to_string())
            .chain(self.fields.iter().flat_map(FieldSpec::column_names))
            .collect()
    }

    /// Flattened column count including the timestamp
    pub fn column_count(&self) -> usize {
        1 + self
            .fields
            .iter()
            .map(FieldSpec::column_count)
            .sum::<usize>()
    }
}
