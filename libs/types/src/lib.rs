//! # Tether Types
//!
//! Shared type system for the Tether telemetry runtime.
//!
//! ## Design Philosophy
//!
//! - **Typed addressing**: [`SystemId`], [`ComponentId`] and [`MessageTypeId`]
//!   are distinct newtypes; a [`MessageKey`] addresses one telemetry stream
//! - **Schema-driven records**: decoded messages are dynamic [`Message`]
//!   values described by a codec-supplied [`MessageSchema`]
//! - **Typed views**: [`TelemetryMessage`] converts common messages into
//!   domain units
//! - **Frame geometry**: [`Vec3`], [`Quaternion`] and [`Transform`] for
//!   fusing streams under a coordinate transform
//!
//! ## Quick Start
//!
//! ```rust
//! use types::protocol::definitions::{ids, standard_schema};
//! use types::{ComponentId, LocalPositionNed, Message, SystemId, TelemetryMessage};
//!
//! let schema = standard_schema(ids::LOCAL_POSITION_NED).unwrap();
//! let msg = Message::new(schema, SystemId::new(1), ComponentId::new(1))
//!     .with("z", -10.0)
//!     .unwrap();
//!
//! let pos = LocalPositionNed::from_message(&msg).unwrap();
//! assert_eq!(pos.position.z, -10.0);
//! ```

pub mod common;
pub mod messages;
pub mod protocol;

pub use common::errors::{FieldError, FieldResult};
pub use common::geometry::{Quaternion, Transform, Vec3};
pub use common::identifiers::{ComponentId, MessageKey, MessageTypeId, SystemId};
pub use common::time::unix_time_secs;

pub use protocol::definitions;
pub use protocol::{
    FieldKind, FieldSpec, FieldValue, Message, MessageHeader, MessageSchema, TIMESTAMP_COLUMN,
};

pub use messages::{
    AttitudeQuaternion, CommandAck, GlobalPositionInt, Heartbeat, HomePosition,
    LocalPositionNed, ParamValue, ScaledImu, TelemetryMessage,
};
