//! # Tether Codec
//!
//! ## Purpose
//!
//! The boundary between raw link bytes and decoded [`Message`] records.
//! The runtime only ever talks to the [`MessageCodec`] trait; the
//! [`FramedCodec`] in this crate is the reference implementation used by
//! the Tether link and by tests.
//!
//! ## Architecture Role
//!
//! ```text
//! libs/types → [codec] → libs/telemetry
//!     ↑           ↓              ↓
//! Schemas    Framing/CRC    Store/Waiters
//! Message    Registry       Access facade
//! ```
//!
//! ## What This Crate Contains
//! - [`MessageCodec`]: decode, encode and per-type schema lookup
//! - [`FramedCodec`]: length-prefixed frames with a CRC32 trailer
//! - [`SchemaRegistry`]: message type id → field layout
//!
//! ## What This Crate Does NOT Contain
//! - Socket or connection handling (belongs in network/)
//! - Caching, waiting or rate control (belongs in telemetry/)

pub mod checksum;
pub mod error;
pub mod frame;
pub mod registry;

pub use error::{CodecError, CodecResult};
pub use frame::{FramedCodec, FRAME_MAGIC, HEADER_LEN};
pub use registry::SchemaRegistry;

use bytes::Bytes;
use std::sync::Arc;
use types::{ComponentId, Message, MessageSchema, MessageTypeId, SystemId};

/// Bidirectional message codec
///
/// `decode` is called once per inbound frame by the receiver loop; any
/// error is logged and the frame is skipped. `encode` is called for every
/// outbound command. `schema` supplies field layouts for persistence and
/// for building outbound messages.
pub trait MessageCodec: Send + Sync {
    fn decode(&self, frame: &[u8]) -> CodecResult<Message>;

    fn encode(&self, msg: &Message) -> CodecResult<Bytes>;

    fn schema(&self, type_id: MessageTypeId) -> Option<Arc<MessageSchema>>;

    /// Zero-initialised outbound message of a registered type
    fn new_message(
        &self,
        type_id: MessageTypeId,
        system: SystemId,
        component: ComponentId,
    ) -> CodecResult<Message> {
        let schema = self
            .schema(type_id)
            .ok_or(CodecError::UnknownMessageType(type_id))?;
        Ok(Message::new(schema, system, component))
    }
}

impl<C: MessageCodec + ?Sized> MessageCodec for Arc<C> {
    fn decode(&self, frame: &[u8]) -> CodecResult<Message> {
        (**self).decode(frame)
    }

    fn encode(&self, msg: &Message) -> CodecResult<Bytes> {
        (**self).encode(msg)
    }

    fn schema(&self, type_id: MessageTypeId) -> Option<Arc<MessageSchema>> {
        (**self).schema(type_id)
    }
}
