// monitor.rs
// Door camera monitor.
//
// A single background task grabs a frame, sends it for recognition and waits
// for the answer before sleeping until the next cycle, so requests never
// overlap. Unknown faces raise an alert at most once per cooldown window.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{Mutex, RwLock, broadcast, mpsc},
    task::JoinHandle,
    time::{Instant, sleep},
};

use crate::config::Config;
use crate::error::{KosError, Result};
use crate::models::{FaceStatus, Recognition};
use crate::state::FaceStore;

/// Detections kept for display.
pub const RECENT_DETECTIONS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub cooldown: Duration,
}

impl MonitorSettings {
    pub fn from_config(config: &Config) -> Self {
        MonitorSettings {
            interval: config.detection_interval,
            cooldown: config.alert_cooldown,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            interval: Duration::from_secs(3),
            cooldown: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Detection {
    #[serde(flatten)]
    pub recognition: Recognition,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FaceAlert {
    pub key: String,
    pub message: String,
    pub confidence: f64,
    pub detected_at: DateTime<Utc>,
}

/// Remembers when each identity last raised an alert.
#[derive(Debug)]
pub struct AlertCooldown {
    window: Duration,
    last: HashMap<String, Instant>,
}

impl AlertCooldown {
    pub fn new(window: Duration) -> Self {
        AlertCooldown {
            window,
            last: HashMap::new(),
        }
    }

    /// True when `key` has not alerted within the window; records `now` if so.
    pub fn should_raise(&mut self, key: &str, now: Instant) -> bool {
        match self.last.get(key) {
            Some(previous) if now.saturating_duration_since(*previous) < self.window => false,
            _ => {
                self.last.insert(key.to_string(), now);
                true
            }
        }
    }
}

/// Where camera frames come from.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// One JPEG frame.
    async fn capture(&self) -> Result<Vec<u8>>;
}

/// IP camera exposing a still-image URL.
pub struct SnapshotUrlSource {
    client: reqwest::Client,
    url: String,
}

impl SnapshotUrlSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| KosError::fetch(None, format!("Kamera tidak dapat digunakan: {err}")))?;
        Ok(SnapshotUrlSource {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FrameSource for SnapshotUrlSource {
    async fn capture(&self) -> Result<Vec<u8>> {
        let failed = |err: reqwest::Error| {
            KosError::fetch(
                err.status().map(|s| s.as_u16()),
                "Gagal mengambil gambar dari kamera",
            )
        };
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?;
        let bytes = response.bytes().await.map_err(failed)?;
        Ok(bytes.to_vec())
    }
}

/// Frame re-read from disk each cycle, e.g. written by an external grabber.
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFileSource { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for SnapshotFileSource {
    async fn capture(&self) -> Result<Vec<u8>> {
        tokio::fs::read(&self.path).await.map_err(|err| {
            KosError::fetch(None, format!("Gagal membaca {}: {err}", self.path.display()))
        })
    }
}

/// Frame source named in the configuration, if any.
pub fn configured_source(config: &Config) -> Result<Option<Arc<dyn FrameSource>>> {
    if let Some(url) = &config.camera_snapshot_url {
        let source = SnapshotUrlSource::new(url.clone(), config.request_timeout)?;
        return Ok(Some(Arc::new(source)));
    }
    Ok(config
        .camera_snapshot_file
        .as_ref()
        .map(|path| Arc::new(SnapshotFileSource::new(path.clone())) as Arc<dyn FrameSource>))
}

pub fn frame_data_url(frame: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(frame))
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitorStatus {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub interval_secs: u64,
    pub cycles: u64,
    pub alerts: u64,
    pub last_error: Option<String>,
    pub detections: Vec<Detection>,
}

struct Shared {
    face: Arc<FaceStore>,
    detections: RwLock<VecDeque<Detection>>,
    last_error: RwLock<Option<String>>,
    cycles: AtomicU64,
    alert_count: AtomicU64,
    alerts: broadcast::Sender<FaceAlert>,
}

struct Running {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    started_at: DateTime<Utc>,
    interval: Duration,
}

pub struct FaceMonitor {
    settings: MonitorSettings,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl FaceMonitor {
    pub fn new(face: Arc<FaceStore>, settings: MonitorSettings) -> Self {
        let (alerts, _) = broadcast::channel(16);
        FaceMonitor {
            settings,
            shared: Arc::new(Shared {
                face,
                detections: RwLock::new(VecDeque::with_capacity(RECENT_DETECTIONS)),
                last_error: RwLock::new(None),
                cycles: AtomicU64::new(0),
                alert_count: AtomicU64::new(0),
                alerts,
            }),
            running: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FaceAlert> {
        self.shared.alerts.subscribe()
    }

    /// Starts the detection loop. `interval` overrides the configured one.
    pub async fn start(
        &self,
        source: Arc<dyn FrameSource>,
        interval: Option<Duration>,
    ) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(KosError::invalid_state("Deteksi wajah sudah berjalan"));
        }

        let interval = interval.unwrap_or(self.settings.interval);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let shared = self.shared.clone();
        let cooldown = AlertCooldown::new(self.settings.cooldown);
        let handle = tokio::spawn(async move {
            run(shared, source, interval, cooldown, shutdown_rx).await;
        });

        *running = Some(Running {
            shutdown_tx,
            handle,
            started_at: Utc::now(),
            interval,
        });
        tracing::info!(interval_ms = interval.as_millis() as u64, "face monitor started");
        Ok(())
    }

    /// Stops the loop and waits for it to exit. Returns false if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(running) = self.running.lock().await.take() else {
            return false;
        };
        let _ = running.shutdown_tx.send(()).await;
        if let Err(err) = running.handle.await {
            tracing::error!(error = %err, "face monitor task ended abnormally");
        }
        tracing::info!("face monitor stopped");
        true
    }

    pub async fn status(&self) -> MonitorStatus {
        let running = self.running.lock().await;
        let active = running.as_ref().filter(|r| !r.handle.is_finished());
        MonitorStatus {
            running: active.is_some(),
            started_at: active.map(|r| r.started_at),
            interval_secs: active
                .map(|r| r.interval)
                .unwrap_or(self.settings.interval)
                .as_secs(),
            cycles: self.shared.cycles.load(Ordering::Relaxed),
            alerts: self.shared.alert_count.load(Ordering::Relaxed),
            last_error: self.shared.last_error.read().await.clone(),
            detections: self.shared.detections.read().await.iter().cloned().collect(),
        }
    }
}

async fn run(
    shared: Arc<Shared>,
    source: Arc<dyn FrameSource>,
    interval: Duration,
    mut cooldown: AlertCooldown,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            result = detect_once(&shared, source.as_ref(), &mut cooldown) => {
                shared.cycles.fetch_add(1, Ordering::Relaxed);
                match result {
                    Ok(()) => *shared.last_error.write().await = None,
                    Err(err) => {
                        tracing::warn!(error = %err, "face detection cycle failed");
                        *shared.last_error.write().await = Some(err.to_string());
                    }
                }
            }
        }
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = sleep(interval) => {}
        }
    }
}

async fn detect_once(
    shared: &Shared,
    source: &dyn FrameSource,
    cooldown: &mut AlertCooldown,
) -> Result<()> {
    let frame = source.capture().await?;
    let results = shared.face.recognize(&frame_data_url(&frame)).await?;
    let now = Utc::now();

    {
        let mut detections = shared.detections.write().await;
        for recognition in &results {
            detections.push_front(Detection {
                recognition: recognition.clone(),
                detected_at: now,
            });
        }
        detections.truncate(RECENT_DETECTIONS);
    }

    let mut raised = false;
    for recognition in results.iter().filter(|r| r.status == FaceStatus::Unknown) {
        let key = recognition.identity_key();
        if !cooldown.should_raise(&key, Instant::now()) {
            continue;
        }
        raised = true;
        shared.alert_count.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(confidence = recognition.confidence, "unknown person at the door");
        // No subscribers is fine.
        let _ = shared.alerts.send(FaceAlert {
            key,
            message: "Orang tidak dikenal terdeteksi!".to_string(),
            confidence: recognition.confidence,
            detected_at: now,
        });
    }

    if raised {
        shared.face.refresh_unread_count().await?;
    }
    Ok(())
}
