//! # Framed Codec
//!
//! Reference [`MessageCodec`] for the Tether link.
//!
//! ## Frame layout
//!
//! ```text
//! ┌───────┬─────────┬─────┬────────┬────────┬──────────┬─────────┬─────────┐
//! │ magic │ len u16 │ seq │ sys u8 │ comp u8│ msgid u32│ payload │ crc32   │
//! │ 0xFD  │ LE      │ u8  │        │        │ LE       │ len B   │ LE      │
//! └───────┴─────────┴─────┴────────┴────────┴──────────┴─────────┴─────────┘
//! ```
//!
//! Payload fields are packed little-endian in schema order. Trailing zero
//! bytes are trimmed on encode and zero-extended on decode, so a shorter
//! payload is valid as long as it does not exceed the schema size.

use crate::checksum::{append_checksum, split_checksum, CHECKSUM_LEN};
use crate::error::{CodecError, CodecResult};
use crate::registry::SchemaRegistry;
use crate::MessageCodec;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use types::{
    unix_time_secs, ComponentId, FieldKind, FieldSpec, FieldValue, Message, MessageHeader,
    MessageSchema, MessageTypeId, SystemId,
};

pub const FRAME_MAGIC: u8 = 0xFD;
pub const HEADER_LEN: usize = 10;

pub struct FramedCodec {
    registry: SchemaRegistry,
    sequence: AtomicU8,
}

impl FramedCodec {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            sequence: AtomicU8::new(0),
        }
    }

    /// Codec over the standard message definitions
    pub fn standard() -> Self {
        Self::new(SchemaRegistry::standard())
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for FramedCodec {
    fn default() -> Self {
        Self::standard()
    }
}

impl MessageCodec for FramedCodec {
    fn decode(&self, frame: &[u8]) -> CodecResult<Message> {
        let min = HEADER_LEN + CHECKSUM_LEN;
        if frame.len() < min {
            return Err(CodecError::too_short(min, frame.len(), "frame header"));
        }
        if frame[0] != FRAME_MAGIC {
            return Err(CodecError::InvalidMagic {
                expected: FRAME_MAGIC,
                actual: frame[0],
            });
        }

        let mut cursor = &frame[1..HEADER_LEN];
        let payload_len = cursor.get_u16_le() as usize;
        let _seq = cursor.get_u8();
        let system = SystemId::new(cursor.get_u8());
        let component = ComponentId::new(cursor.get_u8());
        let type_id = MessageTypeId::new(cursor.get_u32_le());

        let total = HEADER_LEN + payload_len + CHECKSUM_LEN;
        if frame.len() < total {
            return Err(CodecError::too_short(total, frame.len(), "frame payload"));
        }
        let frame = &frame[..total];

        let (body, expected, calculated) = split_checksum(frame)
            .ok_or_else(|| CodecError::too_short(total, frame.len(), "frame checksum"))?;
        if expected != calculated {
            return Err(CodecError::ChecksumMismatch {
                expected,
                calculated,
                frame_len: frame.len(),
            });
        }

        let schema = self
            .registry
            .get(type_id)
            .ok_or(CodecError::UnknownMessageType(type_id))?;
        let payload = &body[HEADER_LEN..];
        let values = decode_payload(&schema, payload)?;

        Ok(Message::from_parts(
            MessageHeader::new(system, component, type_id),
            unix_time_secs(),
            schema,
            values,
        )?)
    }

    fn encode(&self, msg: &Message) -> CodecResult<Bytes> {
        let schema = self
            .registry
            .get(msg.type_id())
            .ok_or(CodecError::UnknownMessageType(msg.type_id()))?;

        let mut payload = BytesMut::with_capacity(schema.payload_len());
        for (spec, value) in schema.fields.iter().zip(msg.values()) {
            encode_field(spec, value, &mut payload)?;
        }
        // keep at least one byte so an all-zero message still has a body
        let mut trimmed = payload.len();
        while trimmed > 1 && payload[trimmed - 1] == 0 {
            trimmed -= 1;
        }
        payload.truncate(trimmed);

        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
        frame.put_u8(FRAME_MAGIC);
        frame.put_u16_le(payload.len() as u16);
        frame.put_u8(self.next_sequence());
        frame.put_u8(msg.header.system.inner());
        frame.put_u8(msg.header.component.inner());
        frame.put_u32_le(msg.type_id().inner());
        frame.put_slice(&payload);
        append_checksum(&mut frame);

        Ok(frame.freeze())
    }

    fn schema(&self, type_id: MessageTypeId) -> Option<Arc<MessageSchema>> {
        self.registry.get(type_id)
    }
}

fn decode_payload(schema: &MessageSchema, payload: &[u8]) -> CodecResult<Vec<FieldValue>> {
    let full_len = schema.payload_len();
    if payload.len() > full_len {
        return Err(CodecError::PayloadTooLong {
            type_id: schema.type_id,
            max: full_len,
            got: payload.len(),
        });
    }

    let mut padded = BytesMut::zeroed(full_len);
    padded[..payload.len()].copy_from_slice(payload);
    let mut buf = padded.freeze();

    let values = schema
        .fields
        .iter()
        .map(|spec| {
            if spec.is_text() {
                let raw = buf.split_to(spec.len);
                let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
                FieldValue::Text(String::from_utf8_lossy(&raw[..end]).into_owned())
            } else if spec.is_array() {
                FieldValue::Array((0..spec.len).map(|_| read_number(spec.kind, &mut buf)).collect())
            } else {
                FieldValue::Scalar(read_number(spec.kind, &mut buf))
            }
        })
        .collect();

    Ok(values)
}

fn read_number(kind: FieldKind, buf: &mut Bytes) -> f64 {
    match kind {
        FieldKind::U8 | FieldKind::Char => buf.get_u8() as f64,
        FieldKind::I8 => buf.get_i8() as f64,
        FieldKind::U16 => buf.get_u16_le() as f64,
        FieldKind::I16 => buf.get_i16_le() as f64,
        FieldKind::U32 => buf.get_u32_le() as f64,
        FieldKind::I32 => buf.get_i32_le() as f64,
        FieldKind::U64 => buf.get_u64_le() as f64,
        FieldKind::I64 => buf.get_i64_le() as f64,
        FieldKind::F32 => buf.get_f32_le() as f64,
        FieldKind::F64 => buf.get_f64_le(),
    }
}

fn encode_field(spec: &FieldSpec, value: &FieldValue, out: &mut BytesMut) -> CodecResult<()> {
    match value {
        FieldValue::Text(s) if spec.is_text() => {
            let bytes = s.as_bytes();
            if bytes.len() > spec.len {
                return Err(CodecError::unencodable(
                    &spec.name,
                    format!("text is {} bytes, capacity {}", bytes.len(), spec.len),
                ));
            }
            out.put_slice(bytes);
            out.put_bytes(0, spec.len - bytes.len());
            Ok(())
        }
        FieldValue::Array(items) if spec.is_array() && items.len() == spec.len => items
            .iter()
            .try_for_each(|v| write_number(spec, *v, out)),
        FieldValue::Scalar(v) if !spec.is_text() && !spec.is_array() => write_number(spec, *v, out),
        other => Err(CodecError::unencodable(
            &spec.name,
            format!("{} value does not fit a {} field", other.kind_name(), spec.kind.name()),
        )),
    }
}

fn write_number(spec: &FieldSpec, v: f64, out: &mut BytesMut) -> CodecResult<()> {
    if !v.is_finite() && !matches!(spec.kind, FieldKind::F32 | FieldKind::F64) {
        return Err(CodecError::unencodable(&spec.name, "non-finite integer"));
    }

    macro_rules! checked_int {
        ($ty:ty, $put:ident) => {{
            let r = v.round();
            if r < <$ty>::MIN as f64 || r > <$ty>::MAX as f64 {
                return Err(CodecError::unencodable(
                    &spec.name,
                    format!("{} out of range for {}", v, spec.kind.name()),
                ));
            }
            out.$put(r as $ty);
        }};
    }

    match spec.kind {
        FieldKind::U8 | FieldKind::Char => checked_int!(u8, put_u8),
        FieldKind::I8 => checked_int!(i8, put_i8),
        FieldKind::U16 => checked_int!(u16, put_u16_le),
        FieldKind::I16 => checked_int!(i16, put_i16_le),
        FieldKind::U32 => checked_int!(u32, put_u32_le),
        FieldKind::I32 => checked_int!(i32, put_i32_le),
        FieldKind::U64 => checked_int!(u64, put_u64_le),
        FieldKind::I64 => checked_int!(i64, put_i64_le),
        FieldKind::F32 => out.put_f32_le(v as f32),
        FieldKind::F64 => out.put_f64_le(v),
    }
    Ok(())
}
