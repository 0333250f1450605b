#![allow(dead_code)]

use std::{env, path::PathBuf, sync::Arc};

use chrono::NaiveDate;
use uuid::Uuid;

use kosflow::{
    config::{BackendKind, Config, OccupancyMode},
    gateway::{Credentials, InMemoryBackend, RoomDraft, TenantDraft},
    models::{BillingPeriod, Id, Room, RoomType, Tenant},
    state::{AppState, SessionStore, assemble},
};

pub struct TestContext {
    pub state: Arc<AppState>,
    pub backend: Arc<InMemoryBackend>,
    pub dir: PathBuf,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

/// Fresh state directory so persisted sessions never leak between tests.
pub fn temp_state_dir() -> PathBuf {
    env::temp_dir().join(format!("kosflow-test-{}", Uuid::new_v4()))
}

pub fn test_config(dir: PathBuf) -> Config {
    Config {
        backend: BackendKind::Memory,
        occupancy: OccupancyMode::Client,
        state_dir: dir,
        ..Config::default()
    }
}

pub async fn setup_with(backend: InMemoryBackend) -> TestContext {
    let dir = temp_state_dir();
    let config = test_config(dir.clone());
    let session = Arc::new(SessionStore::restore(config.auth_file()).await);
    let backend = Arc::new(backend);
    let state = Arc::new(assemble(config, backend.clone(), session));
    TestContext {
        state,
        backend,
        dir,
    }
}

/// Another state over the same backend and state directory with nothing cached,
/// as seen by a freshly started process.
pub async fn restarted(ctx: &TestContext) -> Arc<AppState> {
    let config = test_config(ctx.dir.clone());
    let session = Arc::new(SessionStore::restore(config.auth_file()).await);
    Arc::new(assemble(config, ctx.backend.clone(), session))
}

/// Empty backend, caches loaded.
pub async fn setup() -> TestContext {
    let ctx = setup_with(InMemoryBackend::new()).await;
    refresh_all(&ctx).await;
    ctx
}

pub async fn refresh_all(ctx: &TestContext) {
    ctx.state.rooms.refresh().await.unwrap();
    ctx.state.tenants.refresh().await.unwrap();
    ctx.state.billing.refresh().await.unwrap();
}

pub fn admin_credentials() -> Credentials {
    Credentials {
        email: "admin@kosflow.com".into(),
        password: "admin".into(),
    }
}

pub fn period(raw: &str) -> BillingPeriod {
    raw.parse().unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub async fn add_room(ctx: &TestContext, number: &str, price: i64) -> Room {
    ctx.state
        .rooms
        .create(RoomDraft {
            number: number.into(),
            room_type: RoomType::Standard,
            monthly_price: price,
        })
        .await
        .unwrap()
}

pub async fn add_tenant(ctx: &TestContext, name: &str, room_id: Option<Id>) -> Tenant {
    ctx.state
        .tenants
        .create(TenantDraft {
            name: name.into(),
            contact: "0812".into(),
            move_in: date(2026, 1, 1),
            room_id,
        })
        .await
        .unwrap()
}
