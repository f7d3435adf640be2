mod common;

use common::{settle, Harness};
use std::time::Duration;
use telemetry::{Composite, TelemetryError};
use types::definitions::ids;
use types::{Transform, Vec3};

#[tokio::test(start_paused = true)]
async fn test_unavailable_until_every_role_arrived() {
    let h = Harness::new().await;
    match h.vehicle.combine("state") {
        Err(TelemetryError::Unavailable { combinator, role, .. }) => {
            assert_eq!(combinator, "state");
            assert_eq!(role, "attitude");
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }

    h.feed_fields(ids::ATTITUDE_QUATERNION, &[("q1", 1.0)]).await;
    h.feed_fields(ids::LOCAL_POSITION_NED, &[("x", 2.0)]).await;
    assert!(matches!(
        h.vehicle.combine("state"),
        Err(TelemetryError::Unavailable { role: "imu", .. })
    ));
    // pose needs only attitude and position
    assert_eq!(h.vehicle.pose().unwrap().position, Vec3::new(2.0, 0.0, 0.0));

    h.feed_fields(ids::SCALED_IMU, &[("zacc", -1000.0)]).await;
    let state = h.vehicle.state().unwrap();
    assert_eq!(state.position, Vec3::new(2.0, 0.0, 0.0));
    assert!(state.acceleration.approx_eq(&Vec3::ZERO, 1e-4));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_combinator() {
    let h = Harness::new().await;
    assert!(matches!(
        h.vehicle.combine("wind"),
        Err(TelemetryError::UnknownCombinator(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_combine_get_waits_for_roles() {
    let h = Harness::new().await;
    h.feed_fields(ids::ATTITUDE_QUATERNION, &[("q1", 1.0)]).await;

    let vehicle = h.vehicle.clone();
    let waiting = tokio::spawn(async move {
        vehicle
            .combine_get("pose", Duration::from_secs(1), None)
            .await
    });
    settle().await;
    h.feed_fields(ids::LOCAL_POSITION_NED, &[("y", 3.0)]).await;

    match waiting.await.unwrap().unwrap() {
        Composite::Pose(pose) => assert_eq!(pose.position, Vec3::new(0.0, 3.0, 0.0)),
        other => panic!("expected pose, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_combine_get_times_out_on_missing_role() {
    let h = Harness::new().await;
    h.feed_fields(ids::ATTITUDE_QUATERNION, &[("q1", 1.0)]).await;
    let result = h
        .vehicle
        .combine_get("pose", Duration::from_millis(300), None)
        .await;
    assert!(matches!(result, Err(TelemetryError::Timeout { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_align_to_home_shifts_world_origin() {
    let h = Harness::new().await;
    let home = h
        .message(ids::HOME_POSITION, &[("x", 10.0), ("y", -4.0)])
        .with("q", vec![1.0, 0.0, 0.0, 0.0])
        .unwrap();
    h.feed(&home).await;
    h.feed_fields(ids::ATTITUDE_QUATERNION, &[("q1", 1.0)]).await;
    h.feed_fields(ids::LOCAL_POSITION_NED, &[("x", 10.0), ("y", -4.0), ("z", -5.0)])
        .await;

    let frame = h.vehicle.align_to_home(Duration::from_secs(1)).await.unwrap();
    assert_eq!(h.vehicle.frame(), frame);

    let pose = h.vehicle.pose().unwrap();
    assert!(pose.position.approx_eq(&Vec3::new(0.0, 0.0, -5.0), 1e-9));

    h.vehicle.set_frame(Transform::identity());
    assert!(h
        .vehicle
        .pose()
        .unwrap()
        .position
        .approx_eq(&Vec3::new(10.0, -4.0, -5.0), 1e-9));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_boot_and_condition() {
    let h = Harness::new().await;
    h.feed_fields(ids::HEARTBEAT, &[("system_status", 2.0)]).await;

    let vehicle = h.vehicle.clone();
    let booting =
        tokio::spawn(async move { vehicle.wait_for_boot(Duration::from_secs(5)).await });
    settle().await;
    h.feed_fields(ids::HEARTBEAT, &[("system_status", 2.0)]).await;
    h.feed_fields(ids::HEARTBEAT, &[("system_status", 4.0), ("base_mode", 128.0)])
        .await;
    let heartbeat = booting.await.unwrap().unwrap();
    assert!(heartbeat.is_initialised());

    h.vehicle
        .wait_until(
            |v| {
                v.last_as::<types::Heartbeat>(None)
                    .map(|hb| hb.is_armed())
                    .unwrap_or(false)
            },
            Duration::from_secs(1),
            Duration::from_millis(100),
        )
        .await
        .unwrap();

    let never = h
        .vehicle
        .wait_until(|_| false, Duration::from_millis(300), Duration::from_millis(100))
        .await;
    assert!(matches!(never, Err(TelemetryError::Timeout { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_composite_is_stamped_at_invocation() {
    let h = Harness::new().await;
    let attitude = h
        .message(ids::ATTITUDE_QUATERNION, &[("q1", 1.0)])
        .with_timestamp(42.0);
    let position = h
        .message(ids::LOCAL_POSITION_NED, &[("x", 1.0)])
        .with_timestamp(42.0);
    h.feed(&attitude).await;
    h.feed(&position).await;

    let before = types::unix_time_secs();
    let composite = h.vehicle.combine("pose").unwrap();
    let after = types::unix_time_secs();
    assert!(composite.timestamp() >= before, "stamped {}", composite.timestamp());
    assert!(composite.timestamp() <= after);
}
