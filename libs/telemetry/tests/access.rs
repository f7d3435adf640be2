mod common;

use common::{send, settle, test_config, Harness, VEHICLE_SYSTEM};
use codec::SchemaRegistry;
use network::Transport;
use std::time::Duration;
use telemetry::{LinkStatus, TelemetryError};
use tokio::time::Instant;
use types::definitions::{command_long, commands, ids};
use types::{FieldKind, FieldSpec, LocalPositionNed, MessageKey, MessageSchema, MessageTypeId};

const A: MessageTypeId = MessageTypeId(10);
const B: MessageTypeId = MessageTypeId(20);

fn two_stream_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(MessageSchema::new(A, "A", vec![FieldSpec::scalar("v", FieldKind::F32)]));
    registry.register(MessageSchema::new(B, "B", vec![FieldSpec::scalar("v", FieldKind::F32)]));
    registry.register(command_long());
    registry
}

#[tokio::test(start_paused = true)]
async fn test_last_before_and_after_arrival() {
    let h = Harness::new().await;
    assert!(matches!(
        h.vehicle.last(ids::LOCAL_POSITION_NED, None),
        Err(TelemetryError::NeverReceived { .. })
    ));

    h.feed_fields(ids::LOCAL_POSITION_NED, &[("x", 4.0)]).await;
    let pos: LocalPositionNed = h.vehicle.last_as(None).unwrap();
    assert_eq!(pos.position.x, 4.0);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(matches!(
        h.vehicle.last(ids::LOCAL_POSITION_NED, Some(Duration::from_millis(100))),
        Err(TelemetryError::TooOld { .. })
    ));
    assert!(h
        .vehicle
        .last(ids::LOCAL_POSITION_NED, Some(Duration::from_secs(1)))
        .is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_next_waits_for_a_new_arrival() {
    let h = Harness::new().await;
    h.feed_fields(ids::LOCAL_POSITION_NED, &[("x", 1.0)]).await;

    let vehicle = h.vehicle.clone();
    let waiting = tokio::spawn(async move {
        vehicle
            .next_as::<LocalPositionNed>(Duration::from_secs(1))
            .await
    });
    settle().await;
    h.feed_fields(ids::LOCAL_POSITION_NED, &[("x", 2.0)]).await;

    let pos = waiting.await.unwrap().unwrap();
    assert_eq!(pos.position.x, 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_next_times_out_without_traffic() {
    let h = Harness::new().await;
    let started = Instant::now();
    let result = h
        .vehicle
        .next(ids::LOCAL_POSITION_NED, Duration::from_millis(250))
        .await;
    assert!(matches!(result, Err(TelemetryError::Timeout { .. })));
    assert!(started.elapsed() >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_consumers_are_all_served() {
    let h = Harness::new().await;
    let mut tasks = Vec::new();
    for _ in 0..3 {
        let vehicle = h.vehicle.clone();
        tasks.push(tokio::spawn(async move {
            vehicle.next(ids::HEARTBEAT, Duration::from_secs(1)).await
        }));
    }
    settle().await;
    h.feed_fields(ids::HEARTBEAT, &[("system_status", 4.0)]).await;

    for result in futures::future::join_all(tasks).await {
        assert!(result.unwrap().is_ok());
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_returns_cached_value_without_request() {
    let h = Harness::new().await;
    h.feed_fields(ids::LOCAL_POSITION_NED, &[("x", 7.0)]).await;

    let msg = h
        .vehicle
        .get(ids::LOCAL_POSITION_NED, Duration::from_millis(100), None)
        .await
        .unwrap();
    assert_eq!(msg.scalar("x").unwrap(), 7.0);

    let pos: LocalPositionNed = h
        .vehicle
        .get_as(Duration::from_millis(100), None)
        .await
        .unwrap();
    assert_eq!(pos.position.x, 7.0);
    assert!(h.sent_commands().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_get_times_out_on_silent_stream_after_requesting() {
    let h = Harness::with(test_config(), two_stream_registry()).await;

    h.feed_fields(A, &[("v", 1.0)]).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = Instant::now();
    let result = h.vehicle.get(B, Duration::from_millis(200), None).await;
    assert!(matches!(result, Err(TelemetryError::Timeout { .. })));
    assert!(started.elapsed() >= Duration::from_millis(200));

    let sent = h.sent_commands().await;
    assert_eq!(sent, vec![(commands::REQUEST_MESSAGE, B.inner() as f64, 0.0)]);

    tokio::time::sleep(Duration::from_millis(200)).await;
    h.feed_fields(A, &[("v", 2.0)]).await;
    assert_eq!(h.vehicle.last(A, None).unwrap().scalar("v").unwrap(), 2.0);
    assert_eq!(h.vehicle.history(A).len(), 2);
    assert!(matches!(
        h.vehicle.last(B, None),
        Err(TelemetryError::NeverReceived { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_get_requests_repeatedly_until_answered() {
    let h = Harness::with(test_config(), two_stream_registry()).await;

    let vehicle = h.vehicle.clone();
    let waiting =
        tokio::spawn(async move { vehicle.get(B, Duration::from_secs(5), None).await });

    // unanswered for 2.5 s: initial request plus one per second
    tokio::time::sleep(Duration::from_millis(2500)).await;
    h.feed_fields(B, &[("v", 9.0)]).await;

    let msg = waiting.await.unwrap().unwrap();
    assert_eq!(msg.scalar("v").unwrap(), 9.0);
    let requests = h
        .sent_commands()
        .await
        .into_iter()
        .filter(|(id, p1, _)| *id == commands::REQUEST_MESSAGE && *p1 == B.inner() as f64)
        .count();
    assert_eq!(requests, 3);
}

#[tokio::test(start_paused = true)]
async fn test_get_on_stale_fast_stream_waits_without_request() {
    let h = Harness::with(test_config(), two_stream_registry()).await;
    let msg = h.message(A, &[("v", 1.0)]);
    for _ in 0..5 {
        h.feed(&msg).await;
        tokio::time::sleep(Duration::from_millis(99)).await;
    }
    assert!(h.vehicle.rate(A) > 5.0);

    let vehicle = h.vehicle.clone();
    let waiting = tokio::spawn(async move {
        vehicle
            .get(A, Duration::from_secs(1), Some(Duration::from_millis(10)))
            .await
    });
    settle().await;
    h.feed_fields(A, &[("v", 3.0)]).await;

    assert_eq!(waiting.await.unwrap().unwrap().scalar("v").unwrap(), 3.0);
    assert!(h.sent_commands().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_sees_arrival_racing_the_cache_read() {
    let h = Harness::with(test_config(), two_stream_registry()).await;
    h.feed_fields(A, &[("v", 0.0)]).await;

    // the cached value is always stale, so each get either reads the new
    // arrival or must be woken by it; a missed wake-up ends in Timeout
    for i in 1..=40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let vehicle = h.vehicle.clone();
        let getter = tokio::spawn(async move {
            vehicle
                .get(A, Duration::from_millis(1500), Some(Duration::from_millis(20)))
                .await
        });
        send(&h.remote, &h.codec, &h.message(A, &[("v", i as f64)])).await;

        let msg = getter.await.unwrap().unwrap();
        assert_eq!(msg.scalar("v").unwrap(), i as f64);
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_keeps_waiting_when_request_send_fails() {
    let h = Harness::with(test_config(), two_stream_registry()).await;
    h.client.fail_next_sends(1);

    let vehicle = h.vehicle.clone();
    let waiting =
        tokio::spawn(async move { vehicle.get(B, Duration::from_secs(2), None).await });
    tokio::time::sleep(Duration::from_millis(500)).await;
    h.feed_fields(B, &[("v", 5.0)]).await;

    assert!(waiting.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_are_counted_and_skipped() {
    let h = Harness::new().await;
    h.remote.send(b"not a frame").await.unwrap();
    h.feed_fields(ids::HEARTBEAT, &[]).await;

    let stats = h.connection.stats();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.messages, 1);
    assert!(h.vehicle.last(ids::HEARTBEAT, None).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_releases_waiters_and_fails_fast() {
    let mut config = test_config();
    config.receiver.inactivity_timeout_ms = 500;
    let h = Harness::with(config, SchemaRegistry::standard()).await;
    h.feed_fields(ids::HEARTBEAT, &[]).await;

    let vehicle = h.vehicle.clone();
    let blocked = tokio::spawn(async move {
        vehicle
            .next(ids::LOCAL_POSITION_NED, Duration::from_secs(60))
            .await
    });

    let started = Instant::now();
    let result = blocked.await.unwrap();
    assert!(matches!(result, Err(TelemetryError::ConnectionLost { .. })));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(h.connection.status(), LinkStatus::Lost { .. }));

    assert!(matches!(
        h.vehicle
            .get(ids::LOCAL_POSITION_NED, Duration::from_secs(10), None)
            .await,
        Err(TelemetryError::ConnectionLost { .. })
    ));
    // cached data stays readable
    assert!(h.vehicle.last(ids::HEARTBEAT, None).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_stop_closes_blocked_callers() {
    let h = Harness::new().await;
    let vehicle = h.vehicle.clone();
    let blocked = tokio::spawn(async move {
        vehicle
            .get(ids::LOCAL_POSITION_NED, Duration::from_secs(60), None)
            .await
    });
    settle().await;

    h.connection.stop().await;
    assert!(matches!(
        blocked.await.unwrap(),
        Err(TelemetryError::Closed)
    ));
    assert_eq!(h.connection.status(), LinkStatus::Stopped);
    assert!(matches!(
        h.vehicle.next(ids::HEARTBEAT, Duration::from_secs(1)).await,
        Err(TelemetryError::Closed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_keys_and_rates() {
    let h = Harness::new().await;
    let msg = h.message(ids::ATTITUDE_QUATERNION, &[("q1", 1.0)]);
    for _ in 0..60 {
        h.feed(&msg).await;
        tokio::time::sleep(Duration::from_millis(99)).await;
    }
    h.feed_fields(ids::HEARTBEAT, &[]).await;

    let attitude = MessageKey::from_raw(VEHICLE_SYSTEM, ids::ATTITUDE_QUATERNION.inner());
    let absent = MessageKey::from_raw(VEHICLE_SYSTEM, 999);
    assert_eq!(h.connection.keys().len(), 2);

    let rates = h.connection.rates(&[attitude, absent]);
    assert!((rates[0].1 - 10.0).abs() < 0.01, "rate {}", rates[0].1);
    assert_eq!(rates[1].1, 0.0);
    assert_eq!(h.connection.systems().len(), 1);
    assert_eq!(h.vehicle.message_types().len(), 2);
}
