//! Protocol-level data: field schemas, the decoded message record and the
//! standard message definitions shared by codec and runtime.

pub mod definitions;
pub mod message;
pub mod schema;

pub use message::{FieldValue, Message, MessageHeader};
pub use schema::{FieldKind, FieldSpec, MessageSchema, TIMESTAMP_COLUMN};
