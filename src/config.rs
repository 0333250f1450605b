// config.rs
// Runtime configuration read from the environment (.env is loaded by main).

use anyhow::{Context, Result, bail};
use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const AUTH_STORAGE_KEY: &str = "kosflow-auth";

/// Which implementation answers gateway calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Http,
    Memory,
}

/// Who keeps room status in line with tenant assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyMode {
    /// The backend flips room status itself; the client only refreshes.
    Backend,
    /// The client issues room-status updates after tenant mutations.
    Client,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub bind_addr: SocketAddr,
    pub state_dir: PathBuf,
    pub backend: BackendKind,
    pub occupancy: OccupancyMode,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub detection_interval: Duration,
    pub alert_cooldown: Duration,
    pub camera_snapshot_url: Option<String>,
    pub camera_snapshot_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_url: DEFAULT_API_URL.to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            state_dir: PathBuf::from("./data"),
            backend: BackendKind::Http,
            occupancy: OccupancyMode::Backend,
            request_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(30),
            detection_interval: Duration::from_secs(3),
            alert_cooldown: Duration::from_secs(15),
            camera_snapshot_url: None,
            camera_snapshot_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let backend = match env::var("KOSFLOW_BACKEND").ok().as_deref() {
            None | Some("http") => BackendKind::Http,
            Some("memory") => BackendKind::Memory,
            Some(other) => bail!("unknown KOSFLOW_BACKEND value: {other}"),
        };

        // The local backend does not maintain room status on its own.
        let default_occupancy = match backend {
            BackendKind::Http => OccupancyMode::Backend,
            BackendKind::Memory => OccupancyMode::Client,
        };
        let occupancy = match env::var("KOSFLOW_OCCUPANCY_MODE").ok().as_deref() {
            None => default_occupancy,
            Some("backend") => OccupancyMode::Backend,
            Some("client") => OccupancyMode::Client,
            Some(other) => bail!("unknown KOSFLOW_OCCUPANCY_MODE value: {other}"),
        };

        let bind_addr = match env::var("KOSFLOW_BIND_ADDR") {
            Ok(raw) => raw
                .parse::<SocketAddr>()
                .with_context(|| format!("invalid KOSFLOW_BIND_ADDR: {raw}"))?,
            Err(_) => defaults.bind_addr,
        };

        Ok(Config {
            api_url: env::var("KOSFLOW_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            bind_addr,
            state_dir: env::var("KOSFLOW_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            backend,
            occupancy,
            request_timeout: secs_var("KOSFLOW_REQUEST_TIMEOUT_SECS", defaults.request_timeout)?,
            upload_timeout: secs_var("KOSFLOW_UPLOAD_TIMEOUT_SECS", defaults.upload_timeout)?,
            detection_interval: secs_var(
                "KOSFLOW_DETECTION_INTERVAL_SECS",
                defaults.detection_interval,
            )?,
            alert_cooldown: secs_var("KOSFLOW_ALERT_COOLDOWN_SECS", defaults.alert_cooldown)?,
            camera_snapshot_url: env::var("KOSFLOW_CAMERA_SNAPSHOT_URL").ok(),
            camera_snapshot_file: env::var("KOSFLOW_CAMERA_SNAPSHOT_FILE")
                .ok()
                .map(PathBuf::from),
        })
    }

    /// File holding the persisted session, named after the storage key.
    pub fn auth_file(&self) -> PathBuf {
        self.state_dir.join(format!("{AUTH_STORAGE_KEY}.json"))
    }
}

fn secs_var(key: &str, default: Duration) -> Result<Duration> {
    match env::var(key) {
        Ok(raw) => {
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds"))?;
            if secs == 0 {
                bail!("{key} must be greater than zero");
            }
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}
