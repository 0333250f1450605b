#[path = "common/mod.rs"]
mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::timeout;

use kosflow::{
    KosError, Result,
    models::{BoundingBox, FaceStatus, Recognition},
    monitor::{FaceMonitor, FrameSource, MonitorSettings, SnapshotFileSource},
};

use common::{setup, temp_state_dir};

struct CountingFrames {
    captured: AtomicUsize,
    fail_first: bool,
}

#[async_trait]
impl FrameSource for CountingFrames {
    async fn capture(&self) -> Result<Vec<u8>> {
        let n = self.captured.fetch_add(1, Ordering::SeqCst);
        if self.fail_first && n == 0 {
            return Err(KosError::fetch(None, "Kamera tidak tersedia"));
        }
        Ok(vec![0xff, 0xd8, 0xff, 0xd9])
    }
}

fn frames(fail_first: bool) -> Arc<CountingFrames> {
    Arc::new(CountingFrames {
        captured: AtomicUsize::new(0),
        fail_first,
    })
}

fn stranger() -> Recognition {
    Recognition {
        status: FaceStatus::Unknown,
        name: None,
        tenant_id: None,
        confidence: 0.12,
        location: BoundingBox::default(),
    }
}

fn settings() -> MonitorSettings {
    MonitorSettings {
        interval: Duration::from_millis(20),
        cooldown: Duration::from_secs(60),
    }
}

async fn wait_for_cycles(monitor: &FaceMonitor, cycles: u64) {
    timeout(Duration::from_secs(5), async {
        while monitor.status().await.cycles < cycles {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("monitor did not reach the expected cycle count");
}

#[tokio::test]
async fn unknown_face_alerts_once_per_cooldown() {
    let ctx = setup().await;
    for _ in 0..3 {
        ctx.backend.queue_recognition(vec![stranger()]);
    }
    let monitor = FaceMonitor::new(ctx.state.face.clone(), settings());
    let mut alerts = monitor.subscribe();

    monitor.start(frames(false), None).await.unwrap();
    wait_for_cycles(&monitor, 3).await;
    assert!(monitor.stop().await);

    let status = monitor.status().await;
    assert!(!status.running);
    assert_eq!(status.alerts, 1);
    assert_eq!(
        status
            .detections
            .iter()
            .filter(|d| d.recognition.status == FaceStatus::Unknown)
            .count(),
        3
    );

    let alert = alerts.try_recv().unwrap();
    assert_eq!(alert.key, "unknown");
    assert!(alerts.try_recv().is_err());

    // The badge is only re-read when an alert goes out.
    assert_eq!(ctx.state.face.unread_count().await, 1);
}

#[tokio::test]
async fn capture_errors_do_not_stop_the_loop() {
    let ctx = setup().await;
    let monitor = FaceMonitor::new(ctx.state.face.clone(), settings());
    let source = frames(true);

    monitor.start(source.clone(), None).await.unwrap();
    wait_for_cycles(&monitor, 3).await;
    let status = monitor.status().await;
    assert!(status.running);
    assert!(status.last_error.is_none());
    monitor.stop().await;

    assert!(source.captured.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn starting_twice_is_refused_and_stop_is_idempotent() {
    let ctx = setup().await;
    let monitor = FaceMonitor::new(ctx.state.face.clone(), settings());

    monitor.start(frames(false), None).await.unwrap();
    let err = monitor.start(frames(false), None).await.unwrap_err();
    assert!(matches!(err, KosError::InvalidState(_)));

    assert!(monitor.stop().await);
    assert!(!monitor.stop().await);
    monitor.start(frames(false), Some(Duration::from_millis(50))).await.unwrap();
    assert!(monitor.stop().await);
}

#[tokio::test]
async fn missing_snapshot_file_is_a_fetch_error() {
    let source = SnapshotFileSource::new(temp_state_dir().join("frame.jpg"));
    let err = source.capture().await.unwrap_err();
    assert!(matches!(err, KosError::Fetch { .. }));
}
