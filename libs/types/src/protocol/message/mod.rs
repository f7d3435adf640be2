//! # Decoded Message Record
//!
//! [`Message`] is the dynamic, schema-backed value the codec produces for
//! every frame and consumes for every outbound send. Numeric fields are held
//! as `f64` regardless of wire kind; the codec narrows them on encode.
//!
//! ## Field access
//!
//! ```rust
//! use types::protocol::definitions::{self, ids};
//! use types::{ComponentId, SystemId};
//!
//! let schema = definitions::standard_schema(ids::LOCAL_POSITION_NED).unwrap();
//! let msg = types::Message::new(schema, SystemId::new(1), ComponentId::new(1))
//!     .with("x", 1.5)
//!     .unwrap();
//! assert_eq!(msg.scalar("x").unwrap(), 1.5);
//! ```
//!
//! ## Log rows
//!
//! [`Message::to_row`] and [`Message::from_row`] flatten a message into the
//! column layout described by [`MessageSchema::columns`] and back.

pub mod header;

pub use header::MessageHeader;

use crate::common::errors::{FieldError, FieldResult};
use crate::common::geometry::Vec3;
use crate::common::identifiers::{ComponentId, MessageKey, MessageTypeId, SystemId};
use crate::protocol::schema::{FieldSpec, MessageSchema};
use std::fmt;
use std::sync::Arc;

/// Value held by one message field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(f64),
    Array(Vec<f64>),
    Text(String),
}

impl FieldValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "scalar",
            FieldValue::Array(_) => "array",
            FieldValue::Text(_) => "text",
        }
    }

    /// Zero value matching a field specification
    pub fn zero_for(spec: &FieldSpec) -> Self {
        if spec.is_text() {
            FieldValue::Text(String::new())
        } else if spec.is_array() {
            FieldValue::Array(vec![0.0; spec.len])
        } else {
            FieldValue::Scalar(0.0)
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Scalar(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Scalar(v as f64)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        FieldValue::Scalar(v as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Scalar(v as f64)
    }
}

impl From<u8> for FieldValue {
    fn from(v: u8) -> Self {
        FieldValue::Scalar(v as f64)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(v: Vec<f64>) -> Self {
        FieldValue::Array(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// One decoded (or to-be-encoded) message
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: MessageHeader,
    /// Wall-clock seconds since the epoch, stamped on arrival
    pub timestamp: f64,
    schema: Arc<MessageSchema>,
    values: Vec<FieldValue>,
}

impl Message {
    /// Zero-initialised message of the given schema
    pub fn new(schema: Arc<MessageSchema>, system: SystemId, component: ComponentId) -> Self {
        let values = schema.fields.iter().map(FieldValue::zero_for).collect();
        Self {
            header: MessageHeader::new(system, component, schema.type_id),
            timestamp: 0.0,
            schema,
            values,
        }
    }

    /// Assemble from already-ordered values; used by codecs
    pub fn from_parts(
        header: MessageHeader,
        timestamp: f64,
        schema: Arc<MessageSchema>,
        values: Vec<FieldValue>,
    ) -> FieldResult<Self> {
        if values.len() != schema.fields.len() {
            return Err(FieldError::ColumnCount {
                schema: schema.name.clone(),
                expected: schema.fields.len(),
                got: values.len(),
            });
        }
        Ok(Self {
            header,
            timestamp,
            schema,
            values,
        })
    }

    #[inline]
    pub fn key(&self) -> MessageKey {
        self.header.key()
    }

    #[inline]
    pub fn type_id(&self) -> MessageTypeId {
        self.header.type_id
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &Arc<MessageSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.schema.field_index(name).map(|i| &self.values[i])
    }

    fn field(&self, name: &str) -> FieldResult<&FieldValue> {
        self.get(name).ok_or_else(|| FieldError::UnknownField {
            type_id: self.type_id(),
            field: name.to_string(),
        })
    }

    pub fn scalar(&self, name: &str) -> FieldResult<f64> {
        match self.field(name)? {
            FieldValue::Scalar(v) => Ok(*v),
            other => Err(FieldError::WrongKind {
                field: name.to_string(),
                expected: "scalar",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn array(&self, name: &str) -> FieldResult<&[f64]> {
        match self.field(name)? {
            FieldValue::Array(v) => Ok(v),
            other => Err(FieldError::WrongKind {
                field: name.to_string(),
                expected: "array",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn text(&self, name: &str) -> FieldResult<&str> {
        match self.field(name)? {
            FieldValue::Text(v) => Ok(v),
            other => Err(FieldError::WrongKind {
                field: name.to_string(),
                expected: "text",
                actual: other.kind_name(),
            }),
        }
    }

    /// Three scalar fields read as a vector
    pub fn vec3(&self, names: [&str; 3]) -> FieldResult<Vec3> {
        Ok(Vec3::new(
            self.scalar(names[0])?,
            self.scalar(names[1])?,
            self.scalar(names[2])?,
        ))
    }

    /// Assign a field, checking the value against the schema
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> FieldResult<()> {
        let index = self
            .schema
            .field_index(name)
            .ok_or_else(|| FieldError::UnknownField {
                type_id: self.type_id(),
                field: name.to_string(),
            })?;
        let spec = &self.schema.fields[index];
        let value = value.into();

        match (&value, spec.is_text(), spec.is_array()) {
            (FieldValue::Text(_), true, _) | (FieldValue::Scalar(_), false, false) => {}
            (FieldValue::Array(v), false, true) if v.len() == spec.len => {}
            (FieldValue::Array(v), false, true) => {
                return Err(FieldError::LengthMismatch {
                    field: name.to_string(),
                    expected: spec.len,
                    got: v.len(),
                })
            }
            (other, _, _) => {
                let expected = FieldValue::zero_for(spec).kind_name();
                return Err(FieldError::WrongKind {
                    field: name.to_string(),
                    expected,
                    actual: other.kind_name(),
                });
            }
        }

        self.values[index] = value;
        Ok(())
    }

    /// Builder-style [`Message::set`]
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> FieldResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Flatten into log columns: timestamp, then every field element
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(self.schema.column_count());
        row.push(self.timestamp.to_string());
        for value in &self.values {
            match value {
                FieldValue::Scalar(v) => row.push(v.to_string()),
                FieldValue::Array(items) => row.extend(items.iter().map(|v| v.to_string())),
                FieldValue::Text(s) => row.push(s.clone()),
            }
        }
        row
    }

    /// Rebuild a message from a flattened log row
    pub fn from_row(
        schema: Arc<MessageSchema>,
        system: SystemId,
        component: ComponentId,
        row: &[&str],
    ) -> FieldResult<Self> {
        let expected = schema.column_count();
        if row.len() != expected {
            return Err(FieldError::ColumnCount {
                schema: schema.name.clone(),
                expected,
                got: row.len(),
            });
        }

        let timestamp = parse_number("timestamp", row[0])?;
        let mut cursor = 1;
        let mut values = Vec::with_capacity(schema.fields.len());

        for spec in &schema.fields {
            let value = if spec.is_text() {
                FieldValue::Text(row[cursor].to_string())
            } else if spec.is_array() {
                let items = row[cursor..cursor + spec.len]
                    .iter()
                    .enumerate()
                    .map(|(i, raw)| parse_number(&format!("{}_{}", spec.name, i), raw))
                    .collect::<FieldResult<Vec<f64>>>()?;
                FieldValue::Array(items)
            } else {
                FieldValue::Scalar(parse_number(&spec.name, row[cursor])?)
            };
            cursor += spec.column_count();
            values.push(value);
        }

        Message::from_parts(
            MessageHeader::new(system, component, schema.type_id),
            timestamp,
            schema,
            values,
        )
    }
}

fn parse_number(column: &str, raw: &str) -> FieldResult<f64> {
    raw.trim().parse::<f64>().map_err(|_| FieldError::BadValue {
        column: column.to_string(),
        value: raw.to_string(),
    })
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(sys={}, comp={}, t={:.3})",
            self.schema.name, self.header.system, self.header.component, self.timestamp
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::schema::FieldKind;

    fn xyz_schema() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new(
            500u32,
            "XYZ",
            vec![
                FieldSpec::scalar("x", FieldKind::F32),
                FieldSpec::scalar("y", FieldKind::F32),
                FieldSpec::scalar("z", FieldKind::F32),
            ],
        ))
    }

    fn mixed_schema() -> Arc<MessageSchema> {
        Arc::new(MessageSchema::new(
            501u32,
            "MIXED",
            vec![
                FieldSpec::text("name", 16),
                FieldSpec::array("q", FieldKind::F32, 4),
                FieldSpec::scalar("count", FieldKind::U16),
            ],
        ))
    }

    #[test]
    fn test_new_message_is_zeroed() {
        let msg = Message::new(mixed_schema(), SystemId::new(1), ComponentId::new(1));
        assert_eq!(msg.text("name").unwrap(), "");
        assert_eq!(msg.array("q").unwrap(), &[0.0; 4]);
        assert_eq!(msg.scalar("count").unwrap(), 0.0);
        assert_eq!(msg.key(), MessageKey::from_raw(1, 501));
    }

    #[test]
    fn test_set_validates_kind_and_length() {
        let mut msg = Message::new(mixed_schema(), SystemId::new(1), ComponentId::new(1));

        assert!(matches!(
            msg.set("q", vec![1.0, 2.0]),
            Err(FieldError::LengthMismatch { expected: 4, got: 2, .. })
        ));
        assert!(matches!(
            msg.set("name", 3.0),
            Err(FieldError::WrongKind { expected: "text", .. })
        ));
        assert!(matches!(
            msg.set("nope", 1.0),
            Err(FieldError::UnknownField { .. })
        ));

        msg.set("q", vec![1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(msg.array("q").unwrap()[0], 1.0);
    }

    #[test]
    fn test_row_reconstruction_from_log_columns() {
        let schema = xyz_schema();
        assert_eq!(schema.columns(), vec!["timestamp", "x", "y", "z"]);

        let msg = Message::from_row(
            schema,
            SystemId::new(1),
            ComponentId::new(1),
            &["0.0", "1", "2", "3"],
        )
        .unwrap();

        assert_eq!(msg.timestamp, 0.0);
        assert_eq!(msg.scalar("x").unwrap(), 1.0);
        assert_eq!(msg.scalar("y").unwrap(), 2.0);
        assert_eq!(msg.scalar("z").unwrap(), 3.0);
    }

    #[test]
    fn test_mixed_row_flattening() {
        let msg = Message::new(mixed_schema(), SystemId::new(2), ComponentId::new(1))
            .with("name", "SCR_ENABLE")
            .unwrap()
            .with("q", vec![1.0, 0.5, 0.25, 0.0])
            .unwrap()
            .with("count", 12u32)
            .unwrap()
            .with_timestamp(10.5);

        let row = msg.to_row();
        assert_eq!(row, vec!["10.5", "SCR_ENABLE", "1", "0.5", "0.25", "0", "12"]);

        let cols: Vec<&str> = row.iter().map(String::as_str).collect();
        let back =
            Message::from_row(mixed_schema(), SystemId::new(2), ComponentId::new(1), &cols)
                .unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_bad_row_is_rejected() {
        let err = Message::from_row(
            xyz_schema(),
            SystemId::new(1),
            ComponentId::new(1),
            &["0.0", "1", "2"],
        )
        .unwrap_err();
        assert!(matches!(err, FieldError::ColumnCount { expected: 4, got: 3, .. }));

        let err = Message::from_row(
            xyz_schema(),
            SystemId::new(1),
            ComponentId::new(1),
            &["0.0", "1", "abc", "3"],
        )
        .unwrap_err();
        assert!(matches!(err, FieldError::BadValue { .. }));
    }
}
