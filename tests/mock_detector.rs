//! Runs the mock detector through pause, seek, abort and cancellation.

use daq_device::device::NOT_ALIVE_MARKER;
use daq_device::hardware::MockDetector;
use daq_device::{CancellationToken, DetectorModel, DeviceError, DeviceState, RunnableDevice};
use std::time::Duration;
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

async fn armed(points: usize, exposure: f64) -> RunnableDevice<MockDetector> {
    let device = RunnableDevice::new("mock_det", MockDetector::new(points));
    assert_ok!(device.configure(DetectorModel::new("mock_det", exposure)).await);
    device
}

#[tokio::test]
async fn test_pause_holds_progress_until_resume() {
    let device = armed(12, 0.005).await;
    let run_cancel = CancellationToken::new();

    let control = async {
        sleep(Duration::from_millis(20)).await;
        assert_ok!(device.pause(&CancellationToken::new()).await);
        assert_eq!(device.device_state(), Some(DeviceState::Paused));

        // Let any point already in flight land before sampling.
        sleep(Duration::from_millis(20)).await;
        let held = device.status().unwrap();
        sleep(Duration::from_millis(40)).await;
        let still = device.status().unwrap();
        assert_eq!(held.point_index, still.point_index);
        assert_eq!(held.message, still.message);
        assert!(device.is_busy());

        assert_ok!(device.resume(&CancellationToken::new()).await);
    };

    let (run, ()) = tokio::join!(device.run(None, &run_cancel), control);
    assert_ok!(run);

    let status = device.status().unwrap();
    assert_eq!(status.state, Some(DeviceState::Armed));
    assert_eq!(status.point_index, 11);
    assert_eq!(status.percent_complete, Some(100.0));
    assert!(!device.is_busy());
}

#[tokio::test]
async fn test_seek_while_paused_replays_points() {
    let device = armed(20, 0.005).await;
    let run_cancel = CancellationToken::new();

    let control = async {
        sleep(Duration::from_millis(15)).await;
        assert_ok!(device.pause(&CancellationToken::new()).await);
        assert_ok!(device.seek(1, &CancellationToken::new()).await);
        assert_eq!(device.driver().next_step(), 1);
        assert_ok!(device.resume(&CancellationToken::new()).await);
    };

    let (run, ()) = tokio::join!(device.run(None, &run_cancel), control);
    assert_ok!(run);
    assert_eq!(device.device_state(), Some(DeviceState::Armed));
    assert_eq!(device.driver().next_step(), 0);
}

#[tokio::test]
async fn test_abort_stops_run() {
    let device = armed(100, 0.005).await;
    let run_cancel = CancellationToken::new();

    let control = async {
        sleep(Duration::from_millis(20)).await;
        assert_ok!(device.abort(&CancellationToken::new()).await);
    };

    let (run, ()) = tokio::join!(device.run(None, &run_cancel), control);
    assert_ok!(run);

    let status = device.status().unwrap();
    assert_eq!(status.state, Some(DeviceState::Aborted));
    assert!(status.point_index < 99);
    assert!(!device.is_busy());
}

#[tokio::test]
async fn test_cancelled_run_clears_busy_and_keeps_status() {
    let device = armed(100, 0.005).await;
    let cancel = CancellationToken::new();

    let control = async {
        sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };

    let (run, ()) = tokio::join!(device.run(None, &cancel), control);
    let err = assert_err!(run);
    assert!(err.is_cancelled());
    assert!(!device.is_busy());

    // The run was interrupted mid-scan, the last recorded state stands.
    let status = device.status().unwrap();
    assert_eq!(status.state, Some(DeviceState::Running));
    assert!(status.point_index < 99);
}

#[tokio::test]
async fn test_pre_cancelled_pause_changes_nothing() {
    let device = armed(4, 0.001).await;
    let before = device.status();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = device.pause(&cancel).await.unwrap_err();
    match err {
        DeviceError::Cancelled { device: name, operation } => {
            assert_eq!(name, "mock_det");
            assert_eq!(operation, "pause");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(device.status(), before);
}

#[tokio::test]
async fn test_unreachable_detector_reports_offline_once() {
    let device = armed(4, 0.001).await;
    device.driver().set_reachable(false);

    for _ in 0..5 {
        let snapshot = device.device_snapshot(false);
        assert!(!snapshot.alive);
        assert_eq!(snapshot.state, Some(DeviceState::Offline));
        let label = snapshot.label.unwrap();
        assert_eq!(label, format!("mock_det{NOT_ALIVE_MARKER}"));
    }

    assert_eq!(device.device_snapshot(false), device.device_snapshot(false));

    // Building snapshots never changes the device itself.
    assert!(device.is_alive());
    assert_eq!(device.device_state(), Some(DeviceState::Armed));

    device.driver().set_reachable(true);
    let snapshot = device.device_information();
    assert!(snapshot.alive);
    assert_eq!(snapshot.label.as_deref(), Some("mock_det"));
    assert_eq!(snapshot.health.as_deref(), Some("OK"));
    assert_eq!(device.device_snapshot(false), device.device_snapshot(false));
    assert_eq!(device.device_snapshot(false), snapshot);
}

#[tokio::test]
async fn test_seek_in_flight_can_be_cancelled() {
    let device = RunnableDevice::new(
        "mock_det",
        MockDetector::with_hardware_delay(4, Duration::from_millis(200)),
    );
    let before = device.driver().next_step();
    let cancel = CancellationToken::new();

    let control = async {
        sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    };

    let (seek, ()) = tokio::join!(device.seek(2, &cancel), control);
    let err = assert_err!(seek);
    assert!(err.is_cancelled());
    assert_eq!(device.driver().next_step(), before);
    assert_eq!(device.device_state(), None);
}

#[tokio::test]
async fn test_snapshots_during_run_are_consistent() {
    let device = armed(10, 0.005).await;
    let run_cancel = CancellationToken::new();

    let poll = async {
        for _ in 0..10 {
            let snapshot = device.device_snapshot(false);
            assert!(snapshot.alive);
            assert!(snapshot.state.is_some());
            assert_eq!(snapshot.model, Some(DetectorModel::new("mock_det", 0.005)));
            sleep(Duration::from_millis(3)).await;
        }
    };

    let (run, ()) = tokio::join!(device.run(None, &run_cancel), poll);
    assert_ok!(run);
}

#[tokio::test]
async fn test_disable() {
    let device = armed(4, 0.001).await;
    assert_ok!(device.disable().await);
    let status = device.status().unwrap();
    assert_eq!(status.state, Some(DeviceState::Disabled));
    assert_eq!(status.previous_state, Some(DeviceState::Disabling));
}
