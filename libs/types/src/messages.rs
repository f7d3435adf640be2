//! Typed views over decoded messages
//!
//! The runtime caches dynamic [`Message`] records. Applications that want
//! domain units instead of raw wire fields convert through a
//! [`TelemetryMessage`] view:
//!
//! - attitude as a [`Quaternion`] plus body rates
//! - positions and velocities as [`Vec3`] in the local NED frame
//! - IMU readings in m/s², rad/s and gauss
//! - global positions in degrees and metres

use crate::common::errors::{FieldError, FieldResult};
use crate::common::geometry::{Quaternion, Vec3};
use crate::common::identifiers::MessageTypeId;
use crate::protocol::definitions::{ids, SYSTEM_STATUS_STANDBY};
use crate::protocol::message::Message;

/// Standard gravity, m/s²
pub const GRAVITY: f64 = 9.80665;

/// A message type with a typed, unit-converted representation
pub trait TelemetryMessage: Sized + Send + 'static {
    const TYPE_ID: MessageTypeId;

    fn parse(msg: &Message) -> FieldResult<Self>;

    /// Check the type id, then parse
    fn from_message(msg: &Message) -> FieldResult<Self> {
        if msg.type_id() != Self::TYPE_ID {
            return Err(FieldError::TypeMismatch {
                expected: Self::TYPE_ID,
                got: msg.type_id(),
            });
        }
        Self::parse(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heartbeat {
    pub timestamp: f64,
    pub vehicle_type: u8,
    pub autopilot: u8,
    pub base_mode: u8,
    pub custom_mode: u32,
    pub system_status: u8,
}

impl Heartbeat {
    const ARMED_FLAG: u8 = 0x80;

    /// Boot has completed and the vehicle reports standby or later
    pub fn is_initialised(&self) -> bool {
        self.system_status >= SYSTEM_STATUS_STANDBY
    }

    pub fn is_armed(&self) -> bool {
        self.base_mode & Self::ARMED_FLAG != 0
    }
}

impl TelemetryMessage for Heartbeat {
    const TYPE_ID: MessageTypeId = ids::HEARTBEAT;

    fn parse(msg: &Message) -> FieldResult<Self> {
        Ok(Self {
            timestamp: msg.timestamp,
            vehicle_type: msg.scalar("type")? as u8,
            autopilot: msg.scalar("autopilot")? as u8,
            base_mode: msg.scalar("base_mode")? as u8,
            custom_mode: msg.scalar("custom_mode")? as u32,
            system_status: msg.scalar("system_status")? as u8,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttitudeQuaternion {
    pub timestamp: f64,
    /// Body to NED rotation
    pub attitude: Quaternion,
    /// Roll, pitch and yaw rates in rad/s
    pub body_rates: Vec3,
}

impl TelemetryMessage for AttitudeQuaternion {
    const TYPE_ID: MessageTypeId = ids::ATTITUDE_QUATERNION;

    fn parse(msg: &Message) -> FieldResult<Self> {
        let attitude = Quaternion::new(
            msg.scalar("q1")?,
            msg.scalar("q2")?,
            msg.scalar("q3")?,
            msg.scalar("q4")?,
        )
        .normalized();
        Ok(Self {
            timestamp: msg.timestamp,
            attitude,
            body_rates: msg.vec3(["rollspeed", "pitchspeed", "yawspeed"])?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPositionNed {
    pub timestamp: f64,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl TelemetryMessage for LocalPositionNed {
    const TYPE_ID: MessageTypeId = ids::LOCAL_POSITION_NED;

    fn parse(msg: &Message) -> FieldResult<Self> {
        Ok(Self {
            timestamp: msg.timestamp,
            position: msg.vec3(["x", "y", "z"])?,
            velocity: msg.vec3(["vx", "vy", "vz"])?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledImu {
    pub timestamp: f64,
    /// Body-frame specific force, m/s²
    pub acceleration: Vec3,
    /// Body-frame angular rate, rad/s
    pub angular_rate: Vec3,
    /// Magnetic field, gauss
    pub magnetic: Vec3,
    /// Degrees Celsius
    pub temperature: f64,
}

impl TelemetryMessage for ScaledImu {
    const TYPE_ID: MessageTypeId = ids::SCALED_IMU;

    fn parse(msg: &Message) -> FieldResult<Self> {
        // wire units: mG, mrad/s, mgauss, cdegC
        Ok(Self {
            timestamp: msg.timestamp,
            acceleration: msg
                .vec3(["xacc", "yacc", "zacc"])?
                .scale(GRAVITY / 1000.0),
            angular_rate: msg.vec3(["xgyro", "ygyro", "zgyro"])?.scale(1e-3),
            magnetic: msg.vec3(["xmag", "ymag", "zmag"])?.scale(1e-3),
            temperature: msg.scalar("temperature")? / 100.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalPositionInt {
    pub timestamp: f64,
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Metres above mean sea level
    pub altitude: f64,
    /// Metres above home
    pub relative_altitude: f64,
    /// NED ground velocity, m/s
    pub velocity: Vec3,
    /// Degrees, `None` when unknown
    pub heading: Option<f64>,
}

impl TelemetryMessage for GlobalPositionInt {
    const TYPE_ID: MessageTypeId = ids::GLOBAL_POSITION_INT;

    fn parse(msg: &Message) -> FieldResult<Self> {
        let hdg = msg.scalar("hdg")?;
        Ok(Self {
            timestamp: msg.timestamp,
            latitude: msg.scalar("lat")? * 1e-7,
            longitude: msg.scalar("lon")? * 1e-7,
            altitude: msg.scalar("alt")? / 1000.0,
            relative_altitude: msg.scalar("relative_alt")? / 1000.0,
            velocity: msg.vec3(["vx", "vy", "vz"])?.scale(0.01),
            heading: (hdg != u16::MAX as f64).then(|| hdg / 100.0),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomePosition {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Home in the local NED frame
    pub position: Vec3,
    /// Orientation of the home frame relative to NED
    pub orientation: Quaternion,
}

impl TelemetryMessage for HomePosition {
    const TYPE_ID: MessageTypeId = ids::HOME_POSITION;

    fn parse(msg: &Message) -> FieldResult<Self> {
        let q = msg.array("q")?;
        let orientation = match q {
            [w, x, y, z] => Quaternion::new(*w, *x, *y, *z).normalized(),
            _ => Quaternion::identity(),
        };
        Ok(Self {
            timestamp: msg.timestamp,
            latitude: msg.scalar("latitude")? * 1e-7,
            longitude: msg.scalar("longitude")? * 1e-7,
            altitude: msg.scalar("altitude")? / 1000.0,
            position: msg.vec3(["x", "y", "z"])?,
            orientation,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    pub timestamp: f64,
    pub name: String,
    pub value: f64,
    pub param_type: u8,
    pub count: u16,
    pub index: u16,
}

impl TelemetryMessage for ParamValue {
    const TYPE_ID: MessageTypeId = ids::PARAM_VALUE;

    fn parse(msg: &Message) -> FieldResult<Self> {
        Ok(Self {
            timestamp: msg.timestamp,
            name: msg.text("param_id")?.to_string(),
            value: msg.scalar("param_value")?,
            param_type: msg.scalar("param_type")? as u8,
            count: msg.scalar("param_count")? as u16,
            index: msg.scalar("param_index")? as u16,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandAck {
    pub timestamp: f64,
    pub command: u16,
    pub result: u8,
}

impl CommandAck {
    pub fn accepted(&self) -> bool {
        self.result == 0
    }
}

impl TelemetryMessage for CommandAck {
    const TYPE_ID: MessageTypeId = ids::COMMAND_ACK;

    fn parse(msg: &Message) -> FieldResult<Self> {
        Ok(Self {
            timestamp: msg.timestamp,
            command: msg.scalar("command")? as u16,
            result: msg.scalar("result")? as u8,
        })
    }
}
