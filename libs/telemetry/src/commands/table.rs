//! Named commands and their argument builders
//!
//! Every entry maps an application-facing name onto a numeric command and a
//! builder that turns the caller's arguments into the fixed seven-slot
//! parameter block. Unused slots are zero.

use crate::error::{Result, TelemetryError};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use types::definitions::commands::{self, PARAM_ARITY};

/// A command ready to encode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub id: u16,
    pub params: [f64; PARAM_ARITY],
}

type Builder = fn(&str, &[f64]) -> Result<Vec<f64>>;

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub id: u16,
    /// Argument names, for error messages and discovery
    pub args: &'static [&'static str],
    build: Builder,
}

impl CommandSpec {
    pub fn build(&self, args: &[f64]) -> Result<Command> {
        if args.len() != self.args.len() {
            return Err(TelemetryError::invalid_arguments(
                self.name,
                format!(
                    "expected {} argument(s) ({}), got {}",
                    self.args.len(),
                    self.args.join(", "),
                    args.len()
                ),
            ));
        }
        if let Some(bad) = args.iter().position(|a| !a.is_finite()) {
            return Err(TelemetryError::invalid_arguments(
                self.name,
                format!("argument '{}' is not finite", self.args[bad]),
            ));
        }

        let values = (self.build)(self.name, args)?;
        if values.len() > PARAM_ARITY {
            return Err(TelemetryError::invalid_arguments(
                self.name,
                format!("builder produced {} parameters", values.len()),
            ));
        }
        let mut params = [0.0; PARAM_ARITY];
        params[..values.len()].copy_from_slice(&values);
        Ok(Command {
            id: self.id,
            params,
        })
    }
}

/// Interval in microseconds for a rate in Hz; -1 disables the stream
pub fn interval_for_rate(rate: f64) -> f64 {
    if rate <= 0.0 {
        -1.0
    } else {
        1e6 / rate
    }
}

fn type_id_arg(name: &str, value: f64) -> Result<f64> {
    if value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(TelemetryError::invalid_arguments(
            name,
            format!("{} is not a message type id", value),
        ));
    }
    Ok(value)
}

static COMMANDS: Lazy<HashMap<&'static str, CommandSpec>> = Lazy::new(|| {
    let specs = [
        CommandSpec {
            name: "arm",
            id: commands::COMPONENT_ARM_DISARM,
            args: &[],
            build: |_, _| Ok(vec![1.0]),
        },
        CommandSpec {
            name: "disarm",
            id: commands::COMPONENT_ARM_DISARM,
            args: &[],
            build: |_, _| Ok(vec![0.0]),
        },
        CommandSpec {
            name: "set_mode",
            id: commands::DO_SET_MODE,
            args: &["custom_mode"],
            // base mode flag: custom mode enabled
            build: |_, a| Ok(vec![1.0, a[0]]),
        },
        CommandSpec {
            name: "set_airspeed",
            id: commands::DO_CHANGE_SPEED,
            args: &["speed"],
            build: |_, a| Ok(vec![0.0, a[0], -1.0]),
        },
        CommandSpec {
            name: "set_groundspeed",
            id: commands::DO_CHANGE_SPEED,
            args: &["speed"],
            build: |_, a| Ok(vec![1.0, a[0], -1.0]),
        },
        CommandSpec {
            name: "set_home",
            id: commands::DO_SET_HOME,
            args: &["latitude", "longitude", "altitude", "yaw"],
            build: |name, a| {
                if a[0].abs() > 90.0 || a[1].abs() > 180.0 {
                    return Err(TelemetryError::invalid_arguments(
                        name,
                        format!("({}, {}) is not a valid position", a[0], a[1]),
                    ));
                }
                Ok(vec![0.0, 0.0, 0.0, a[3], a[0], a[1], a[2]])
            },
        },
        CommandSpec {
            name: "set_servo",
            id: commands::DO_SET_SERVO,
            args: &["channel", "pwm"],
            build: |_, a| Ok(vec![a[0], a[1]]),
        },
        CommandSpec {
            name: "request_message",
            id: commands::REQUEST_MESSAGE,
            args: &["type_id"],
            build: |name, a| Ok(vec![type_id_arg(name, a[0])?]),
        },
        CommandSpec {
            name: "set_message_rate",
            id: commands::SET_MESSAGE_INTERVAL,
            args: &["type_id", "rate_hz"],
            build: |name, a| Ok(vec![type_id_arg(name, a[0])?, interval_for_rate(a[1])]),
        },
    ];
    specs.into_iter().map(|spec| (spec.name, spec)).collect()
});

pub fn lookup(name: &str) -> Result<&'static CommandSpec> {
    COMMANDS
        .get(name)
        .ok_or_else(|| TelemetryError::UnknownCommand(name.to_string()))
}

/// Resolve a name and build its parameter block
pub fn build(name: &str, args: &[f64]) -> Result<Command> {
    lookup(name)?.build(args)
}

/// Registered command names, sorted
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<_> = COMMANDS.keys().copied().collect();
    names.sort_unstable();
    names
}
