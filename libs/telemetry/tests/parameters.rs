mod common;

use common::{Harness, SimVehicle};
use std::sync::atomic::Ordering;
use std::time::Duration;
use telemetry::{ParamOptions, TelemetryError};

#[tokio::test(start_paused = true)]
async fn test_get_parameter_then_cached() {
    let h = Harness::new().await;
    let sim = SimVehicle::spawn(&h, &[("WPNAV_SPEED", 500.0)]);

    let value = h.vehicle.get_parameter("WPNAV_SPEED").await.unwrap();
    assert_eq!(value, 500.0);
    assert_eq!(sim.requests(), 1);

    // default options answer from the table
    assert_eq!(h.vehicle.get_parameter("WPNAV_SPEED").await.unwrap(), 500.0);
    assert_eq!(sim.requests(), 1);

    let fresh = ParamOptions {
        use_cache: false,
        ..ParamOptions::default()
    };
    sim.params.lock().insert("WPNAV_SPEED".to_string(), 750.0);
    assert_eq!(
        h.vehicle
            .get_parameter_with("WPNAV_SPEED", fresh)
            .await
            .unwrap(),
        750.0
    );
    assert_eq!(sim.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_get_parameter_retries_after_lost_request() {
    let h = Harness::new().await;
    let sim = SimVehicle::spawn(&h, &[("SYSID_THISMAV", 1.0)]);
    sim.ignore.store(1, Ordering::SeqCst);

    let value = h.vehicle.get_parameter("SYSID_THISMAV").await.unwrap();
    assert_eq!(value, 1.0);
    assert_eq!(sim.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_get_parameter_gives_up_after_retries() {
    let h = Harness::new().await;
    let sim = SimVehicle::spawn(&h, &[]);

    let options = ParamOptions {
        use_cache: false,
        retries: 4,
        interval: Duration::from_millis(200),
    };
    let result = h.vehicle.get_parameter_with("MISSING", options).await;
    assert!(matches!(result, Err(TelemetryError::Timeout { .. })));
    assert_eq!(sim.requests(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_set_parameter_waits_for_echo() {
    let h = Harness::new().await;
    let sim = SimVehicle::spawn(&h, &[("RTL_ALT", 1500.0)]);

    h.vehicle.set_parameter("RTL_ALT", 3000.0).await.unwrap();
    assert_eq!(sim.params.lock()["RTL_ALT"], 3000.0);
    assert_eq!(h.vehicle.parameters()["RTL_ALT"], 3000.0);
}

#[tokio::test(start_paused = true)]
async fn test_set_parameter_unacknowledged_times_out() {
    let h = Harness::new().await;
    let sim = SimVehicle::spawn(&h, &[("RTL_ALT", 1500.0)]);
    // vehicle never acknowledges the write
    sim.ignore.store(usize::MAX, Ordering::SeqCst);

    let options = ParamOptions {
        use_cache: false,
        retries: 2,
        interval: Duration::from_millis(100),
    };
    let result = h
        .vehicle
        .set_parameter_with("RTL_ALT", 3000.0, options)
        .await;
    assert!(matches!(result, Err(TelemetryError::Timeout { .. })));
    assert_eq!(sim.requests(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_names_are_rejected_locally() {
    let h = Harness::new().await;
    let sim = SimVehicle::spawn(&h, &[]);

    assert!(matches!(
        h.vehicle.get_parameter("A_NAME_LONGER_THAN_16").await,
        Err(TelemetryError::InvalidArguments { .. })
    ));
    assert!(matches!(
        h.vehicle.set_parameter("X", f64::INFINITY).await,
        Err(TelemetryError::InvalidArguments { .. })
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sim.requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_parameter_list_download() {
    let h = Harness::new().await;
    let _sim = SimVehicle::spawn(&h, &[("A", 1.0), ("B", 2.0), ("C", 3.0)]);

    h.vehicle.request_parameter_list().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let params = h.vehicle.parameters();
    assert_eq!(params.len(), 3);
    assert_eq!(params["C"], 3.0);
    assert_eq!(h.vehicle.parameter_count(), Some(3));
}
