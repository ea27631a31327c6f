//! The full flight pipeline driven by a scripted vehicle.

use std::sync::Arc;

use flightvisor::link::{Attitude, LocalPositionNed, Message, ScriptedLink, VehicleCommand};
use flightvisor::{Config, app};

fn fast_config() -> Config {
    Config::from_yaml(
        "heartbeat_period_ms: 100\n\
         telemetry_window_ms: 300\n\
         poll_timeout_ms: 50\n\
         run_duration_ms: 0\n\
         grace_ms: 10000\n",
    )
    .unwrap()
}

fn climb_sample(link: &ScriptedLink, ts: u32, z: f32) {
    link.push(Message::LocalPositionNed(LocalPositionNed {
        time_boot_ms: ts,
        z,
        vz: 0.5,
        ..Default::default()
    }))
    .push(Message::Attitude(Attitude {
        time_boot_ms: ts + 50,
        ..Default::default()
    }));
}

#[tokio::test(start_paused = true)]
async fn run_ends_when_vehicle_is_lost() {
    let link = Arc::new(ScriptedLink::new());
    for _ in 0..3 {
        link.push(Message::Heartbeat);
    }
    climb_sample(&link, 100, 4.0);

    let report = app::run(&fast_config(), link.clone()).await.unwrap();

    assert_eq!(report.joined.stopped, 4);
    assert!(report.joined.is_clean());
    assert_eq!(
        report
            .drained
            .iter()
            .map(|(q, _)| q.as_str())
            .collect::<Vec<_>>(),
        ["heartbeat", "command", "telemetry"]
    );
    assert_eq!(link.commands(), vec![VehicleCommand::change_altitude(5.0)]);
    assert!(link.heartbeats_sent() >= 1);
    assert_eq!(link.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_ends_after_run_duration() {
    let mut cfg = fast_config();
    cfg.run_duration_ms = 500;
    cfg.disconnect_threshold = 1000;
    let link = Arc::new(ScriptedLink::new());

    let report = app::run(&cfg, link.clone()).await.unwrap();
    assert_eq!(report.joined.stopped, 4);
    assert!(link.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_replicas_is_a_setup_failure() {
    let mut cfg = fast_config();
    cfg.workers.telemetry = 0;

    let err = app::run(&cfg, Arc::new(ScriptedLink::new()))
        .await
        .unwrap_err();
    assert!(err.is_setup());
    assert_eq!(err.as_label(), "group_invalid_replica_count");
}

#[tokio::test(start_paused = true)]
async fn fatal_role_error_is_reported_as_failed_replica() {
    let mut cfg = fast_config();
    cfg.run_duration_ms = 300;
    cfg.altitude_tolerance_m = -1.0;

    let report = app::run(&cfg, Arc::new(ScriptedLink::new()))
        .await
        .unwrap();
    assert_eq!(report.joined.failed, 1);
    assert_eq!(report.joined.stopped, 3);
}
