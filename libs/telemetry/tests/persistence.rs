mod common;

use codec::SchemaRegistry;
use common::{test_config, Harness};
use std::fs;
use std::sync::Arc;
use telemetry::MessageLog;
use types::{FieldKind, FieldSpec, MessageKey, MessageSchema, MessageTypeId};

const XYZ: MessageTypeId = MessageTypeId(30);

fn xyz_schema() -> MessageSchema {
    MessageSchema::new(
        XYZ,
        "XYZ",
        vec![
            FieldSpec::scalar("x", FieldKind::F32),
            FieldSpec::scalar("y", FieldKind::F32),
            FieldSpec::scalar("z", FieldKind::F32),
        ],
    )
}

fn registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::standard();
    registry.register(xyz_schema());
    registry
}

#[tokio::test(start_paused = true)]
async fn test_arrivals_are_logged_and_restored() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.cache.log_dir = Some(dir.path().to_path_buf());
    config.cache.history_len = 2;
    let key = MessageKey::new(types::SystemId::new(common::VEHICLE_SYSTEM), XYZ);
    let path = MessageLog::path_for(dir.path(), key);

    {
        let h = Harness::with(config.clone(), registry()).await;
        h.feed_fields(XYZ, &[("x", 1.0), ("y", 2.0), ("z", 3.0)]).await;
        h.feed_fields(XYZ, &[("x", 4.0), ("y", 5.0), ("z", 6.0)]).await;
        h.feed_fields(XYZ, &[("x", 7.0), ("y", 8.0), ("z", 9.0)]).await;
        h.connection.stop().await;
    }

    let content = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "timestamp,x,y,z");
    assert_eq!(lines.len(), 4);
    assert!(lines[1].ends_with(",1,2,3"), "row {}", lines[1]);

    let all = MessageLog::read_all(&path, &Arc::new(xyz_schema()), key).unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    // a new session starts with the tail of the log
    let h = Harness::with(config, registry()).await;
    let restored = h.vehicle.last(XYZ, None).unwrap();
    assert_eq!(restored.scalar("z").unwrap(), 9.0);
    assert_eq!(h.vehicle.history(XYZ).len(), 2);
    assert_eq!(h.vehicle.rate(XYZ), 0.0);

    h.feed_fields(XYZ, &[("x", 0.5)]).await;
    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.matches("timestamp").count(), 1);
    assert_eq!(content.lines().count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_without_log_dir_nothing_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::with(test_config(), registry()).await;
    h.feed_fields(XYZ, &[("x", 1.0)]).await;
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(h.connection.config().cache.log_dir.is_none());
}
