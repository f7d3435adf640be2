//! # Stream Identifiers
//!
//! Typed wrappers for the small integers that address a telemetry stream:
//! the emitting system, the component on that system and the numeric
//! message type assigned by the codec.
//!
//! A [`MessageKey`] is the `(system, message type)` pair that uniquely
//! addresses one logical stream. Every cache entry, waiter and rate
//! estimate in the runtime is keyed by it.
//!
//! ```rust
//! use types::{MessageKey, MessageTypeId, SystemId};
//!
//! let key = MessageKey::new(SystemId::new(1), MessageTypeId::new(31));
//! assert_eq!(key.to_string(), "1:31");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generates a transparent, copyable newtype over an unsigned integer.
macro_rules! define_typed_id {
    (
        $(#[$meta:meta])*
        $name:ident($inner:ty)
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            Default,
            Serialize,
            Deserialize
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            #[inline(always)]
            pub const fn new(id: $inner) -> Self {
                Self(id)
            }

            #[inline(always)]
            pub const fn inner(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline(always)]
            fn from(id: $inner) -> Self {
                Self(id)
            }
        }

        impl From<$name> for $inner {
            #[inline(always)]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_typed_id! {
    /// Identifier of a vehicle (or ground station) on the link
    SystemId(u8)
}

define_typed_id! {
    /// Identifier of a component (autopilot, camera, ...) within a system
    ComponentId(u8)
}

define_typed_id! {
    /// Numeric message type as assigned by the codec
    MessageTypeId(u32)
}

/// Address of one logical telemetry stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub system: SystemId,
    pub type_id: MessageTypeId,
}

impl MessageKey {
    #[inline(always)]
    pub const fn new(system: SystemId, type_id: MessageTypeId) -> Self {
        Self { system, type_id }
    }

    /// Shorthand for tests and tables that deal in raw numbers
    #[inline(always)]
    pub const fn from_raw(system: u8, type_id: u32) -> Self {
        Self::new(SystemId(system), MessageTypeId(type_id))
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.type_id)
    }
}
