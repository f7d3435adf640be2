use super::{Composite, FusionContext, RoleValues};
use types::messages::GRAVITY;
use types::{
    AttitudeQuaternion, FieldResult, LocalPositionNed, Quaternion, ScaledImu, Vec3,
};

/// Full kinematic state
///
/// Position and attitude place the body in the world frame; the rates are
/// expressed along the body axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    /// Fusion time
    pub timestamp: f64,
    /// World frame
    pub position: Vec3,
    /// Body to world
    pub attitude: Quaternion,
    /// Body frame, m/s
    pub velocity: Vec3,
    /// Body frame, m/s², gravity removed
    pub acceleration: Vec3,
    /// Body frame, rad/s
    pub angular_rate: Vec3,
}

pub(super) fn fuse(values: &RoleValues, ctx: &FusionContext) -> FieldResult<Composite> {
    let attitude: AttitudeQuaternion = values.view("attitude")?;
    let position: LocalPositionNed = values.view("position")?;
    let imu: ScaledImu = values.view("imu")?;

    let world_attitude = ctx.frame.apply_rotation(attitude.attitude);
    let to_body = |v_ned: Vec3| {
        world_attitude
            .inverse()
            .rotate(ctx.frame.apply_vector(v_ned))
    };

    // accelerometers measure specific force; add gravity back in NED
    let specific_force = attitude.attitude.rotate(imu.acceleration);
    let acceleration_ned = specific_force + Vec3::new(0.0, 0.0, GRAVITY);

    Ok(Composite::State(KinematicState {
        timestamp: ctx.time,
        position: ctx.frame.apply_point(position.position),
        attitude: world_attitude,
        velocity: to_body(position.velocity),
        acceleration: to_body(acceleration_ned),
        angular_rate: attitude.body_rates,
    }))
}
