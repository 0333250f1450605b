// state/mod.rs
// AppState, initialization, and re-exports of submodules.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::config::{BackendKind, Config, OccupancyMode};
use crate::gateway::{Backend, HttpGateway, InMemoryBackend};
use crate::monitor::{self, FaceMonitor, FrameSource, MonitorSettings};
use crate::occupancy::{BackendManaged, GatewayOccupancy, RoomOccupancyCoordinator};

mod auth;
mod billing;
mod cache;
pub mod dashboard;
mod face;
mod reminders;
mod rooms;
mod tenants;

pub use auth::*;
pub use billing::*;
pub use cache::*;
pub use face::*;
pub use reminders::*;
pub use rooms::*;
pub use tenants::*;

pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub auth: AuthStore,
    pub rooms: Arc<RoomStore>,
    pub tenants: Arc<TenantStore>,
    pub billing: BillingManager,
    pub reminders: ReminderStore,
    pub face: Arc<FaceStore>,
    pub monitor: FaceMonitor,
    /// Camera the monitor reads from when started without an explicit source.
    pub frames: Option<Arc<dyn FrameSource>>,
}

pub async fn init_state(config: Config) -> Result<AppState> {
    let session = Arc::new(SessionStore::restore(config.auth_file()).await);
    let frames = monitor::configured_source(&config).context("camera source")?;

    let state = match config.backend {
        BackendKind::Http => {
            let gateway = HttpGateway::new(&config, session.clone())
                .context("building backend client")?;
            tracing::info!(api_url = %config.api_url, "using remote backend");
            assemble(config, Arc::new(gateway), session)
        }
        BackendKind::Memory => {
            tracing::info!("using in-memory backend");
            assemble(config, Arc::new(InMemoryBackend::seeded()), session)
        }
    };

    Ok(AppState { frames, ..state })
}

/// Wires every store to one backend.
pub fn assemble<B: Backend + 'static>(
    config: Config,
    backend: Arc<B>,
    session: Arc<SessionStore>,
) -> AppState {
    let rooms = Arc::new(RoomStore::new(backend.clone()));
    let occupancy: Arc<dyn RoomOccupancyCoordinator> = match config.occupancy {
        OccupancyMode::Backend => Arc::new(BackendManaged),
        OccupancyMode::Client => Arc::new(GatewayOccupancy::new(backend.clone())),
    };
    let tenants = Arc::new(TenantStore::new(backend.clone(), rooms.clone(), occupancy));
    let billing = BillingManager::new(backend.clone(), tenants.clone(), rooms.clone());
    let face = Arc::new(FaceStore::new(backend.clone()));
    let monitor = FaceMonitor::new(face.clone(), MonitorSettings::from_config(&config));

    AppState {
        auth: AuthStore::new(session.clone(), backend.clone()),
        reminders: ReminderStore::new(backend),
        config,
        session,
        rooms,
        tenants,
        billing,
        face,
        monitor,
        frames: None,
    }
}
