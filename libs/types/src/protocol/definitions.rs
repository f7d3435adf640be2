//! # Standard Message Definitions
//!
//! Numeric ids and field layouts of the messages the runtime itself relies
//! on: liveness, the parameter protocol, command transport and the
//! kinematic streams fused by the standard combinators.
//!
//! Field order is wire order. Codecs seed their schema registry from
//! [`standard_schemas`] and may register further message types on top.

use crate::common::identifiers::MessageTypeId;
use crate::protocol::schema::{FieldKind, FieldSpec, MessageSchema};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Message type ids
pub mod ids {
    use crate::common::identifiers::MessageTypeId;

    pub const HEARTBEAT: MessageTypeId = MessageTypeId(0);
    pub const PARAM_REQUEST_READ: MessageTypeId = MessageTypeId(20);
    pub const PARAM_REQUEST_LIST: MessageTypeId = MessageTypeId(21);
    pub const PARAM_VALUE: MessageTypeId = MessageTypeId(22);
    pub const PARAM_SET: MessageTypeId = MessageTypeId(23);
    pub const SCALED_IMU: MessageTypeId = MessageTypeId(26);
    pub const ATTITUDE_QUATERNION: MessageTypeId = MessageTypeId(31);
    pub const LOCAL_POSITION_NED: MessageTypeId = MessageTypeId(32);
    pub const GLOBAL_POSITION_INT: MessageTypeId = MessageTypeId(33);
    pub const COMMAND_LONG: MessageTypeId = MessageTypeId(76);
    pub const COMMAND_ACK: MessageTypeId = MessageTypeId(77);
    pub const HOME_POSITION: MessageTypeId = MessageTypeId(242);
}

/// Command ids carried in the `command` field of COMMAND_LONG
pub mod commands {
    pub const DO_SET_MODE: u16 = 176;
    pub const DO_CHANGE_SPEED: u16 = 178;
    pub const DO_SET_HOME: u16 = 179;
    pub const DO_SET_SERVO: u16 = 183;
    pub const COMPONENT_ARM_DISARM: u16 = 400;
    pub const SET_MESSAGE_INTERVAL: u16 = 511;
    pub const REQUEST_MESSAGE: u16 = 512;

    /// Number of float parameters in a command-long message
    pub const PARAM_ARITY: usize = 7;
}

/// Heartbeat `system_status` at or above which the vehicle has finished booting
pub const SYSTEM_STATUS_STANDBY: u8 = 3;

/// `param_type` for 32-bit float parameters
pub const PARAM_TYPE_REAL32: u8 = 9;

/// Capacity of the NUL-padded parameter name
pub const PARAM_ID_LEN: usize = 16;

use FieldKind::*;

fn scalar(name: &str, kind: FieldKind) -> FieldSpec {
    FieldSpec::scalar(name, kind)
}

pub fn heartbeat() -> MessageSchema {
    MessageSchema::new(
        ids::HEARTBEAT,
        "HEARTBEAT",
        vec![
            scalar("type", U8),
            scalar("autopilot", U8),
            scalar("base_mode", U8),
            scalar("custom_mode", U32),
            scalar("system_status", U8),
            scalar("mavlink_version", U8),
        ],
    )
}

pub fn param_request_read() -> MessageSchema {
    MessageSchema::new(
        ids::PARAM_REQUEST_READ,
        "PARAM_REQUEST_READ",
        vec![
            scalar("target_system", U8),
            scalar("target_component", U8),
            FieldSpec::text("param_id", PARAM_ID_LEN),
            scalar("param_index", I16),
        ],
    )
}

pub fn param_request_list() -> MessageSchema {
    MessageSchema::new(
        ids::PARAM_REQUEST_LIST,
        "PARAM_REQUEST_LIST",
        vec![scalar("target_system", U8), scalar("target_component", U8)],
    )
}

pub fn param_value() -> MessageSchema {
    MessageSchema::new(
        ids::PARAM_VALUE,
        "PARAM_VALUE",
        vec![
            FieldSpec::text("param_id", PARAM_ID_LEN),
            scalar("param_value", F32),
            scalar("param_type", U8),
            scalar("param_count", U16),
            scalar("param_index", U16),
        ],
    )
}

pub fn param_set() -> MessageSchema {
    MessageSchema::new(
        ids::PARAM_SET,
        "PARAM_SET",
        vec![
            scalar("target_system", U8),
            scalar("target_component", U8),
            FieldSpec::text("param_id", PARAM_ID_LEN),
            scalar("param_value", F32),
            scalar("param_type", U8),
        ],
    )
}

pub fn scaled_imu() -> MessageSchema {
    MessageSchema::new(
        ids::SCALED_IMU,
        "SCALED_IMU",
        vec![
            scalar("time_boot_ms", U32),
            scalar("xacc", I16),
            scalar("yacc", I16),
            scalar("zacc", I16),
            scalar("xgyro", I16),
            scalar("ygyro", I16),
            scalar("zgyro", I16),
            scalar("xmag", I16),
            scalar("ymag", I16),
            scalar("zmag", I16),
            scalar("temperature", I16),
        ],
    )
}

pub fn attitude_quaternion() -> MessageSchema {
    MessageSchema::new(
        ids::ATTITUDE_QUATERNION,
        "ATTITUDE_QUATERNION",
        vec![
            scalar("time_boot_ms", U32),
            scalar("q1", F32),
            scalar("q2", F32),
            scalar("q3", F32),
            scalar("q4", F32),
            scalar("rollspeed", F32),
            scalar("pitchspeed", F32),
            scalar("yawspeed", F32),
            FieldSpec::array("repr_offset_q", F32, 4),
        ],
    )
}

pub fn local_position_ned() -> MessageSchema {
    MessageSchema::new(
        ids::LOCAL_POSITION_NED,
        "LOCAL_POSITION_NED",
        vec![
            scalar("time_boot_ms", U32),
            scalar("x", F32),
            scalar("y", F32),
            scalar("z", F32),
            scalar("vx", F32),
            scalar("vy", F32),
            scalar("vz", F32),
        ],
    )
}

pub fn global_position_int() -> MessageSchema {
    MessageSchema::new(
        ids::GLOBAL_POSITION_INT,
        "GLOBAL_POSITION_INT",
        vec![
            scalar("time_boot_ms", U32),
            scalar("lat", I32),
            scalar("lon", I32),
            scalar("alt", I32),
            scalar("relative_alt", I32),
            scalar("vx", I16),
            scalar("vy", I16),
            scalar("vz", I16),
            scalar("hdg", U16),
        ],
    )
}

pub fn command_long() -> MessageSchema {
    MessageSchema::new(
        ids::COMMAND_LONG,
        "COMMAND_LONG",
        vec![
            scalar("target_system", U8),
            scalar("target_component", U8),
            scalar("command", U16),
            scalar("confirmation", U8),
            scalar("param1", F32),
            scalar("param2", F32),
            scalar("param3", F32),
            scalar("param4", F32),
            scalar("param5", F32),
            scalar("param6", F32),
            scalar("param7", F32),
        ],
    )
}

pub fn command_ack() -> MessageSchema {
    MessageSchema::new(
        ids::COMMAND_ACK,
        "COMMAND_ACK",
        vec![scalar("command", U16), scalar("result", U8)],
    )
}

pub fn home_position() -> MessageSchema {
    MessageSchema::new(
        ids::HOME_POSITION,
        "HOME_POSITION",
        vec![
            scalar("latitude", I32),
            scalar("longitude", I32),
            scalar("altitude", I32),
            scalar("x", F32),
            scalar("y", F32),
            scalar("z", F32),
            FieldSpec::array("q", F32, 4),
            scalar("approach_x", F32),
            scalar("approach_y", F32),
            scalar("approach_z", F32),
        ],
    )
}

static STANDARD: Lazy<HashMap<MessageTypeId, Arc<MessageSchema>>> = Lazy::new(|| {
    [
        heartbeat(),
        param_request_read(),
        param_request_list(),
        param_value(),
        param_set(),
        scaled_imu(),
        attitude_quaternion(),
        local_position_ned(),
        global_position_int(),
        command_long(),
        command_ack(),
        home_position(),
    ]
    .into_iter()
    .map(|schema| (schema.type_id, Arc::new(schema)))
    .collect()
});

/// Shared schema of a standard message type
pub fn standard_schema(type_id: MessageTypeId) -> Option<Arc<MessageSchema>> {
    STANDARD.get(&type_id).cloned()
}

/// Every standard schema, ordered by type id
pub fn standard_schemas() -> Vec<Arc<MessageSchema>> {
    let mut all: Vec<_> = STANDARD.values().cloned().collect();
    all.sort_by_key(|s| s.type_id);
    all
}
