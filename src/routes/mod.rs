// routes/mod.rs
// Route handlers and the router that wires them behind the session guard.

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::session;
use crate::state::AppState;

pub mod billing;
pub mod dashboard;
pub mod face;
pub mod helpers;
pub mod login;
pub mod logout;
pub mod profile;
pub mod reminders;
pub mod rooms;
pub mod tenants;

pub use billing::*;
pub use dashboard::dashboard;
pub use face::*;
pub use login::login;
pub use logout::logout;
pub use profile::me;
pub use reminders::*;
pub use rooms::*;
pub use tenants::*;

pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/api/me", get(me))
        .route("/api/dashboard", get(dashboard))
        .route("/api/rooms", get(rooms_index).post(rooms_create))
        .route("/api/rooms/available", get(rooms_available))
        .route(
            "/api/rooms/{id}",
            get(rooms_show).put(rooms_update).delete(rooms_delete),
        )
        .route("/api/tenants", get(tenants_index).post(tenants_create))
        .route(
            "/api/tenants/{id}",
            get(tenants_show).put(tenants_update).delete(tenants_delete),
        )
        .route("/api/tenants/{id}/billings", get(tenant_billings))
        .route("/api/tenants/{id}/reminders", get(tenant_reminders))
        .route(
            "/api/tenants/{id}/face",
            post(tenant_face_upload).delete(tenant_face_delete),
        )
        .route("/api/billings", get(billings_index).post(billings_create))
        .route("/api/billings/generate", post(billings_generate))
        .route("/api/billings/check-overdue", post(billings_check_overdue))
        .route("/api/billings/unbilled", get(billings_unbilled))
        .route(
            "/api/billings/{id}",
            get(billings_show).put(billings_update).delete(billings_delete),
        )
        .route("/api/billings/{id}/pay", post(billings_pay))
        .route("/api/billings/{id}/payments", get(billings_payments))
        .route(
            "/api/billings/{id}/external-payment",
            post(billings_external_payment),
        )
        .route("/api/reminders", get(reminders_index).post(reminders_create))
        .route(
            "/api/reminders/{id}",
            get(reminders_show)
                .put(reminders_update)
                .delete(reminders_delete),
        )
        .route("/api/reminders/{id}/test", post(reminders_test))
        .route("/api/face/logs", get(face_logs))
        .route("/api/face/stats", get(face_stats))
        .route("/api/face/recognize", post(face_recognize))
        .route(
            "/api/face/notifications",
            get(face_notifications).post(face_notification_push),
        )
        .route(
            "/api/face/notifications/unread-count",
            get(face_unread_count),
        )
        .route(
            "/api/face/notifications/read-all",
            post(face_notifications_read_all),
        )
        .route(
            "/api/face/notifications/{id}/read",
            post(face_notification_read),
        )
        .route("/api/face/monitor/start", post(monitor_start))
        .route("/api/face/monitor/stop", post(monitor_stop))
        .route("/api/face/monitor/status", get(monitor_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session::require_session,
        ));

    Router::new()
        .route("/login", post(login))
        .merge(protected)
        .with_state(state)
}
