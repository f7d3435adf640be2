use super::{Composite, FusionContext, RoleValues};
use types::{AttitudeQuaternion, FieldResult, LocalPositionNed, Quaternion, Vec3};

/// Position and orientation in the world frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Fusion time
    pub timestamp: f64,
    pub position: Vec3,
    pub attitude: Quaternion,
}

impl Pose {
    /// Yaw in radians
    pub fn heading(&self) -> f64 {
        self.attitude.to_euler().2
    }
}

pub(super) fn fuse(values: &RoleValues, ctx: &FusionContext) -> FieldResult<Composite> {
    let attitude: AttitudeQuaternion = values.view("attitude")?;
    let position: LocalPositionNed = values.view("position")?;

    Ok(Composite::Pose(Pose {
        timestamp: ctx.time,
        position: ctx.frame.apply_point(position.position),
        attitude: ctx.frame.apply_rotation(attitude.attitude),
    }))
}
