//! End-to-end buffered-transition cycles against mock hardware.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use kim_core::{Channel, KimError, SequencerClient};
use kim_driver_mock::{MockMotor, MockMotorFactory};
use kim_server::{DriverKind, KimServer, ServerConfig};

fn ch(index: u8) -> Channel {
    Channel::new(index).expect("channel")
}

fn group(prefix: &str) -> Vec<String> {
    (1..=4).map(|i| format!("{prefix}_Ch{i}")).collect()
}

fn two_controller_config(max_move_globals: Vec<String>) -> ServerConfig {
    ServerConfig {
        port: 0,
        serials: vec!["97100362".into(), "97100395".into()],
        position_globals: vec![group("Kinesis"), group("Steering")],
        max_move_globals,
        driver: DriverKind::Mock,
    }
}

async fn connect(config: ServerConfig) -> (KimServer, Vec<Arc<MockMotor>>) {
    let factory = MockMotorFactory::new();
    let mut motors = Vec::new();
    for serial in &config.serials {
        let motor = MockMotor::new(serial);
        factory.add(motor.clone()).await;
        motors.push(motor);
    }
    let server = KimServer::connect(config, &factory).await.expect("connect");
    (server, motors)
}

fn write_shot(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::with_suffix(".toml").expect("temp file");
    file.write_all(contents.as_bytes()).expect("write shot");
    file
}

fn shot_globals(entries: &[(&str, i64)]) -> String {
    let mut text = String::from("[globals]\n");
    for (name, value) in entries {
        text.push_str(&format!("{name} = {value}\n"));
    }
    text
}

async fn buffered(server: &KimServer, shot: &Path) -> anyhow::Result<()> {
    server.on_buffered(shot).await
}

#[tokio::test]
async fn moves_only_the_channels_that_changed() {
    let (server, motors) = connect(two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]))
    .await;

    let shot = write_shot(&shot_globals(&[
        ("Kinesis_Ch1", 100),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 200),
        ("Kinesis_Ch4", 0),
        ("Steering_Ch1", 0),
        ("Steering_Ch2", 0),
        ("Steering_Ch3", 0),
        ("Steering_Ch4", 0),
        ("Kinesis_MaxMove", 3000),
        ("Steering_MaxMove", 3000),
    ]));

    buffered(&server, shot.path()).await.expect("cycle");

    assert_eq!(motors[0].moves().await, vec![(ch(1), 100, 0), (ch(3), 200, 0)]);
    assert!(motors[1].moves().await.is_empty());
}

#[tokio::test]
async fn move_over_the_limit_fails_with_no_move_issued() {
    let (server, motors) = connect(two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]))
    .await;

    let shot = write_shot(&shot_globals(&[
        ("Kinesis_Ch1", 100),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 0),
        ("Kinesis_Ch4", 0),
        ("Steering_Ch1", 0),
        ("Steering_Ch2", 0),
        ("Steering_Ch3", 0),
        ("Steering_Ch4", 0),
        ("Kinesis_MaxMove", 50),
        ("Steering_MaxMove", 3000),
    ]));

    let err = buffered(&server, shot.path()).await.expect_err("over limit");
    match err.downcast_ref::<KimError>() {
        Some(KimError::MoveTooLarge {
            serial,
            channel,
            current,
            desired,
            max_move,
        }) => {
            assert_eq!(serial, "97100362");
            assert_eq!(*channel, ch(1));
            assert_eq!(*current, 0);
            assert_eq!(*desired, 100);
            assert_eq!(*max_move, 50);
        }
        other => panic!("expected MoveTooLarge, got {other:?}"),
    }
    assert!(motors[0].moves().await.is_empty());
    assert!(motors[1].moves().await.is_empty());
}

#[tokio::test]
async fn missing_max_move_entry_fails_before_any_move() {
    // two controllers configured, one max-move attribute supplied
    let (server, motors) =
        connect(two_controller_config(vec!["Kinesis_MaxMove".into()])).await;

    let shot = write_shot(&shot_globals(&[
        ("Kinesis_Ch1", 100),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 0),
        ("Kinesis_Ch4", 0),
        ("Steering_Ch1", 100),
        ("Steering_Ch2", 0),
        ("Steering_Ch3", 0),
        ("Steering_Ch4", 0),
        ("Kinesis_MaxMove", 3000),
    ]));

    let err = buffered(&server, shot.path()).await.expect_err("mismatch");
    assert!(matches!(
        err.downcast_ref::<KimError>(),
        Some(KimError::MaxMoveCountMismatch {
            expected: 2,
            actual: 1
        })
    ));
    assert!(motors[0].moves().await.is_empty());
    assert!(motors[1].moves().await.is_empty());
}

#[tokio::test]
async fn each_cycle_uses_the_freshly_read_limit() {
    let (server, motors) = connect(two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]))
    .await;

    let quiet = [
        ("Steering_Ch1", 0),
        ("Steering_Ch2", 0),
        ("Steering_Ch3", 0),
        ("Steering_Ch4", 0),
        ("Steering_MaxMove", 3000),
    ];

    // first cycle: generous limit, move channel 1 to 100
    let mut entries = vec![
        ("Kinesis_Ch1", 100i64),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 0),
        ("Kinesis_Ch4", 0),
        ("Kinesis_MaxMove", 3000),
    ];
    entries.extend_from_slice(&quiet);
    let shot = write_shot(&shot_globals(&entries));
    buffered(&server, shot.path()).await.expect("first cycle");
    assert_eq!(motors[0].moves().await, vec![(ch(1), 100, 0)]);

    // second cycle: tight limit, a further delta of 100 must now fail
    let mut entries = vec![
        ("Kinesis_Ch1", 200i64),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 0),
        ("Kinesis_Ch4", 0),
        ("Kinesis_MaxMove", 50),
    ];
    entries.extend_from_slice(&quiet);
    let shot = write_shot(&shot_globals(&entries));
    let err = buffered(&server, shot.path()).await.expect_err("tight limit");
    assert!(matches!(
        err.downcast_ref::<KimError>(),
        Some(KimError::MoveTooLarge { max_move: 50, .. })
    ));
    assert_eq!(motors[0].moves().await.len(), 1, "no second move issued");
}

#[tokio::test]
async fn hardware_error_during_a_move_fails_the_cycle() {
    let (server, motors) = connect(two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]))
    .await;
    motors[0].fail_next_move("drive stalled").await;

    let shot = write_shot(&shot_globals(&[
        ("Kinesis_Ch1", 100),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 200),
        ("Kinesis_Ch4", 0),
        ("Steering_Ch1", 50),
        ("Steering_Ch2", 0),
        ("Steering_Ch3", 0),
        ("Steering_Ch4", 0),
        ("Kinesis_MaxMove", 3000),
        ("Steering_MaxMove", 3000),
    ]));

    let err = buffered(&server, shot.path()).await.expect_err("move fails");
    assert!(err.to_string().contains("drive stalled"), "{err:#}");

    // the failed channel was never recorded, the rest of the cycle did
    // not run: channel 3 and the second controller stay untouched
    assert!(motors[0].moves().await.is_empty());
    assert!(motors[1].moves().await.is_empty());
}

#[tokio::test]
async fn missing_shot_attribute_fails_the_cycle() {
    let (server, motors) = connect(two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]))
    .await;

    let shot = write_shot("[globals]\nKinesis_Ch1 = 100\n");
    let err = buffered(&server, shot.path()).await.expect_err("incomplete shot");
    assert!(err.to_string().contains("missing global"));
    assert!(motors[0].moves().await.is_empty());
}

#[tokio::test]
async fn abort_is_repeatable_and_cycles_continue_afterwards() {
    let (server, motors) = connect(two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]))
    .await;

    server.on_abort().await;
    server.on_abort().await;

    let shot = write_shot(&shot_globals(&[
        ("Kinesis_Ch1", 10),
        ("Kinesis_Ch2", 0),
        ("Kinesis_Ch3", 0),
        ("Kinesis_Ch4", 0),
        ("Steering_Ch1", 0),
        ("Steering_Ch2", 0),
        ("Steering_Ch3", 0),
        ("Steering_Ch4", 0),
        ("Kinesis_MaxMove", 3000),
        ("Steering_MaxMove", 3000),
    ]));
    buffered(&server, shot.path()).await.expect("cycle after abort");
    assert_eq!(motors[0].moves().await, vec![(ch(1), 10, 0)]);

    let static_result = server.on_static(shot.path()).await;
    assert!(static_result.is_ok());
}

#[tokio::test]
async fn connect_fails_when_a_configured_serial_is_missing() {
    let factory = MockMotorFactory::new();
    factory.add(MockMotor::new("97100362")).await;

    let config = two_controller_config(vec![
        "Kinesis_MaxMove".into(),
        "Steering_MaxMove".into(),
    ]);
    let err = KimServer::connect(config, &factory)
        .await
        .expect_err("97100395 absent");
    assert!(err.to_string().contains("97100395"), "{err:#}");
}
