//! # Combinators
//!
//! A combinator fuses the latest values of several streams into one
//! composite. It declares named roles, each bound to a message type on the
//! target vehicle, and a pure fusion function over those roles plus the
//! vehicle's current world frame.
//!
//! Roles are read through the vehicle's access facade, so fusion inherits
//! its semantics: the non-blocking form fails with
//! [`crate::TelemetryError::Unavailable`] when a role has never been
//! received, the blocking form waits for every role under one deadline.
//! Fusion itself never touches the link.
//!
//! Composites are stamped with the invocation time, not the arrival times
//! of their inputs.

mod pose;
mod state;

pub use pose::Pose;
pub use state::KinematicState;

use crate::error::{Result, TelemetryError};
use std::collections::HashMap;
use std::sync::Arc;
use types::definitions::ids;
use types::{FieldResult, Message, MessageTypeId, TelemetryMessage, Transform};

/// Fused output of one combinator
#[derive(Debug, Clone, PartialEq)]
pub enum Composite {
    State(KinematicState),
    Pose(Pose),
}

impl Composite {
    pub fn timestamp(&self) -> f64 {
        match self {
            Composite::State(state) => state.timestamp,
            Composite::Pose(pose) => pose.timestamp,
        }
    }

    pub fn into_state(self) -> Option<KinematicState> {
        match self {
            Composite::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn into_pose(self) -> Option<Pose> {
        match self {
            Composite::Pose(pose) => Some(pose),
            _ => None,
        }
    }
}

/// Role values handed to a fusion function
pub struct RoleValues {
    values: HashMap<&'static str, Arc<Message>>,
}

impl RoleValues {
    pub fn new(values: HashMap<&'static str, Arc<Message>>) -> Self {
        Self { values }
    }

    pub fn message(&self, role: &'static str) -> Option<&Arc<Message>> {
        self.values.get(role)
    }

    /// Typed view of a role; a missing role reads as a type mismatch
    pub fn view<T: TelemetryMessage>(&self, role: &'static str) -> FieldResult<T> {
        match self.values.get(role) {
            Some(msg) => T::from_message(msg),
            None => Err(types::FieldError::UnknownField {
                type_id: T::TYPE_ID,
                field: role.to_string(),
            }),
        }
    }

}

/// Inputs fusion may use besides the role values
#[derive(Debug, Clone, Copy)]
pub struct FusionContext {
    /// World from local NED
    pub frame: Transform,
    /// Wall-clock time of the invocation, stamped on the composite
    pub time: f64,
}

pub type FuseFn = fn(&RoleValues, &FusionContext) -> FieldResult<Composite>;

#[derive(Clone)]
pub struct Combinator {
    pub name: &'static str,
    pub roles: Vec<(&'static str, MessageTypeId)>,
    fuse: FuseFn,
}

impl Combinator {
    pub fn new(name: &'static str, roles: Vec<(&'static str, MessageTypeId)>, fuse: FuseFn) -> Self {
        Self { name, roles, fuse }
    }

    pub fn fuse(&self, values: &RoleValues, ctx: &FusionContext) -> Result<Composite> {
        Ok((self.fuse)(values, ctx)?)
    }
}

impl std::fmt::Debug for Combinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Combinator")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CombinatorRegistry {
    combinators: HashMap<&'static str, Combinator>,
}

impl CombinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `state` and `pose`
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Combinator::new(
            "state",
            vec![
                ("attitude", ids::ATTITUDE_QUATERNION),
                ("position", ids::LOCAL_POSITION_NED),
                ("imu", ids::SCALED_IMU),
            ],
            state::fuse,
        ));
        registry.register(Combinator::new(
            "pose",
            vec![
                ("attitude", ids::ATTITUDE_QUATERNION),
                ("position", ids::LOCAL_POSITION_NED),
            ],
            pose::fuse,
        ));
        registry
    }

    pub fn register(&mut self, combinator: Combinator) {
        self.combinators.insert(combinator.name, combinator);
    }

    pub fn get(&self, name: &str) -> Result<&Combinator> {
        self.combinators
            .get(name)
            .ok_or_else(|| TelemetryError::UnknownCombinator(name.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.combinators.keys().copied().collect();
        names.sort_unstable();
        names
    }
}
