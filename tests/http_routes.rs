#[path = "common/mod.rs"]
mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for oneshot

use kosflow::{routes::build_router, session::SESSION_COOKIE_NAME};

use common::{TestContext, add_room, add_tenant, date, period, restarted, setup};

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// Signs in through `/login` and returns the cookie header to send back.
async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "email": "admin", "password": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    let pair = set_cookie.split(';').next().unwrap().to_string();
    assert!(pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")));
    pair
}

async fn app_with_rooms() -> (TestContext, Router) {
    let ctx = setup().await;
    let a = add_room(&ctx, "Kamar 01", 800_000).await;
    let b = add_room(&ctx, "Kamar 02", 1_200_000).await;
    add_tenant(&ctx, "Budi", Some(a.id)).await;
    add_tenant(&ctx, "Sarah", Some(b.id)).await;
    let app = build_router(ctx.state.clone());
    (ctx, app)
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (ctx, app) = app_with_rooms().await;

    let (status, body) = send(&app, get("/api/dashboard", "kosflow_session=nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["redirect"], "/login");
    assert_eq!(body["message"], "Sesi berakhir, silakan login kembali");

    let (status, body) = send(
        &app,
        json_request("POST", "/login", None, json!({ "email": "admin", "password": "salah" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Username atau password salah");
    assert_eq!(
        ctx.state.auth.last_error().await.as_deref(),
        Some("Username atau password salah")
    );
}

#[tokio::test]
async fn dashboard_reflects_generation_and_payment() {
    let (_ctx, app) = app_with_rooms().await;
    let cookie = login(&app).await;

    let (status, body) = send(&app, get("/api/me", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "admin");

    let period = chrono::Utc::now().format("%Y-%m").to_string();
    let due = chrono::Utc::now().date_naive() + chrono::Duration::days(30);
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/billings/generate",
            Some(&cookie),
            json!({ "bulan_tagihan": period, "tanggal_jatuh_tempo": due.format("%Y-%m-%d").to_string() }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created"], 2);

    let (_, body) = send(&app, get("/api/billings", &cookie)).await;
    assert_eq!(body["data"]["pending_total"], 2_000_000);
    let first = body["data"]["items"][0]["id"].as_i64().unwrap();
    let amount = body["data"]["items"][0]["total_tagihan"].as_i64().unwrap();

    let uri = format!("/api/billings/{first}/pay");
    let pay = json!({ "jumlah_bayar": amount, "metode_bayar": "cash" });
    let (status, body) = send(&app, json_request("POST", &uri, Some(&cookie), pay.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["billing"]["status_tagihan"], "Lunas");

    let (status, body) = send(&app, json_request("POST", &uri, Some(&cookie), pay)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Tagihan sudah lunas");

    let (status, body) = send(&app, get("/api/dashboard", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body["data"];
    assert_eq!(summary["rooms"]["occupied"], 2);
    assert_eq!(summary["active_tenants"], 2);
    assert_eq!(summary["monthly_income"], amount);
    assert_eq!(summary["pending_total"], 2_000_000 - amount);
    assert!(summary["overdue"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_schedule_is_a_bad_request() {
    let (ctx, app) = app_with_rooms().await;
    let cookie = login(&app).await;

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/billings/generate",
            Some(&cookie),
            json!({ "bulan_tagihan": "Maret 2026" , "tanggal_jatuh_tempo": "2026-03-10" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/billings/generate", Some(&cookie), json!({ "bulan_tagihan": "2026-03" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(ctx.backend.billing_count(), 0);
}

#[tokio::test]
async fn unknown_ids_are_not_found_and_occupied_rooms_stay() {
    let (ctx, app) = app_with_rooms().await;
    let cookie = login(&app).await;

    let (status, body) = send(&app, get("/api/billings/9999", &cookie)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Tagihan #9999 tidak ditemukan");

    let occupied = ctx.state.rooms.list().await[0].id;
    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/rooms/{occupied}"))
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let (_ctx, app) = app_with_rooms().await;
    let cookie = login(&app).await;

    let (status, _) = send(&app, json_request("POST", "/logout", Some(&cookie), json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, get("/api/rooms", &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_request_after_restart_can_pay_and_edit() {
    let (ctx, _) = app_with_rooms().await;
    let summary = ctx
        .state
        .billing
        .generate_for_period(period("2026-03"), date(2026, 3, 10))
        .await
        .unwrap();
    let billing = &summary.billings[0];

    let app = build_router(restarted(&ctx).await);
    let cookie = login(&app).await;

    let uri = format!("/api/billings/{}/pay", billing.id);
    let pay = json!({ "jumlah_bayar": billing.amount, "metode_bayar": "transfer" });
    let (status, body) = send(&app, json_request("POST", &uri, Some(&cookie), pay)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["billing"]["status_tagihan"], "Lunas");

    let tenant = billing.tenant_id;
    let mut edit = serde_json::to_value(ctx.state.tenants.get(tenant).await.unwrap()).unwrap();
    edit["nama_penghuni"] = json!("Budi Santoso");

    let app = build_router(restarted(&ctx).await);
    let cookie = login(&app).await;
    let (status, body) = send(
        &app,
        json_request("PUT", &format!("/api/tenants/{tenant}"), Some(&cookie), edit),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nama_penghuni"], "Budi Santoso");
}

#[tokio::test]
async fn pushed_notification_raises_the_badge_once() {
    let (_ctx, app) = app_with_rooms().await;
    let cookie = login(&app).await;

    let notification = json!({
        "id": 41,
        "pesan": "Orang tidak dikenal terdeteksi!",
        "sudah_dibaca": false,
        "waktu": "2026-03-10T08:00:00Z",
    });
    for _ in 0..2 {
        let (status, body) = send(
            &app,
            json_request("POST", "/api/face/notifications", Some(&cookie), notification.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 1);
    }
}
