//! Message header: who sent a message and what type it is
//!
//! The codec fills the header from the wire frame. The runtime reads
//! `system` and `type_id` to build the stream's [`MessageKey`].

use crate::common::identifiers::{ComponentId, MessageKey, MessageTypeId, SystemId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageHeader {
    pub system: SystemId,
    pub component: ComponentId,
    pub type_id: MessageTypeId,
}

impl MessageHeader {
    pub const fn new(system: SystemId, component: ComponentId, type_id: MessageTypeId) -> Self {
        Self {
            system,
            component,
            type_id,
        }
    }

    #[inline]
    pub const fn key(&self) -> MessageKey {
        MessageKey::new(self.system, self.type_id)
    }
}
