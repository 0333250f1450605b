// gateway/http.rs
// REST client for the KosFlow backend: bearer auth, `{"data": ...}` envelopes, forced logout on 401.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, multipart};
use serde::{Deserialize, de::DeserializeOwned};
use std::{sync::Arc, time::Duration};

use super::{
    AuthGateway, BillingChanges, BillingDraft, BillingGateway, Credentials, FaceGateway,
    GenerateOutcome, GenerateRequest, LogFilter, LoginResponse, OverdueSweep, PaymentDraft,
    PaymentRedirect, ReminderDraft, ReminderGateway, RoomDraft, RoomGateway, TenantDraft,
    TenantGateway,
};
use crate::config::Config;
use crate::error::{KosError, Result};
use crate::models::{
    AccessLog, AuthUser, Billing, FaceNotification, FaceStats, Id, Payment, Recognition,
    Reminder, Room, RoomStatus, Tenant,
};
use crate::state::SessionStore;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Deserialize)]
struct RecognizeBody {
    #[serde(default)]
    results: Vec<Recognition>,
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    upload_timeout: Duration,
    session: Arc<SessionStore>,
}

impl HttpGateway {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| KosError::fetch(None, format!("gagal membuat klien HTTP: {err}")))?;
        Ok(HttpGateway {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            upload_timeout: config.upload_timeout,
            session,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends the request and returns the successful response body as raw bytes.
    async fn execute(&self, request: RequestBuilder, fallback: &str) -> Result<Vec<u8>> {
        let request = match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await.map_err(|err| {
            tracing::warn!(error = %err, "backend request failed");
            if err.is_timeout() {
                KosError::fetch(None, "Server tidak merespons, coba lagi nanti")
            } else {
                KosError::fetch(None, fallback)
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|_| KosError::fetch(Some(status.as_u16()), fallback))?;

        if status == StatusCode::UNAUTHORIZED {
            self.session.force_logout().await;
            return Err(KosError::Auth(
                backend_message(&body).unwrap_or_else(|| "Sesi berakhir, silakan login kembali".into()),
            ));
        }
        if !status.is_success() {
            let message = backend_message(&body).unwrap_or_else(|| fallback.to_string());
            tracing::debug!(status = status.as_u16(), %message, "backend rejected request");
            return Err(KosError::fetch(Some(status.as_u16()), message));
        }
        Ok(body.to_vec())
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> Result<T> {
        let body = self.execute(request, fallback).await?;
        serde_json::from_slice(&body).map_err(|err| {
            tracing::warn!(error = %err, "unexpected backend payload");
            KosError::fetch(None, fallback)
        })
    }

    async fn fetch_data<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> Result<T> {
        self.fetch_json::<Envelope<T>>(request, fallback)
            .await
            .map(|envelope| envelope.data)
    }

    async fn fetch_unit(&self, request: RequestBuilder, fallback: &str) -> Result<()> {
        self.execute(request, fallback).await.map(|_| ())
    }
}

fn backend_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
}

#[async_trait]
impl RoomGateway for HttpGateway {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.fetch_data(self.request(Method::GET, "/kamar"), "Gagal memuat data kamar")
            .await
    }

    async fn create_room(&self, draft: &RoomDraft) -> Result<Room> {
        self.fetch_data(
            self.request(Method::POST, "/kamar").json(draft),
            "Gagal menambah kamar",
        )
        .await
    }

    async fn update_room(&self, id: Id, draft: &RoomDraft) -> Result<Room> {
        self.fetch_data(
            self.request(Method::PUT, &format!("/kamar/{id}")).json(draft),
            "Gagal memperbarui kamar",
        )
        .await
    }

    async fn delete_room(&self, id: Id) -> Result<()> {
        self.fetch_unit(
            self.request(Method::DELETE, &format!("/kamar/{id}")),
            "Gagal menghapus kamar",
        )
        .await
    }

    async fn update_room_status(&self, id: Id, status: RoomStatus) -> Result<Room> {
        self.fetch_data(
            self.request(Method::PATCH, &format!("/kamar/{id}/status"))
                .json(&serde_json::json!({ "status_kamar": status })),
            "Gagal memperbarui status kamar",
        )
        .await
    }
}

#[async_trait]
impl TenantGateway for HttpGateway {
    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        self.fetch_data(self.request(Method::GET, "/penghuni"), "Gagal memuat data penghuni")
            .await
    }

    async fn create_tenant(&self, draft: &TenantDraft) -> Result<Tenant> {
        self.fetch_data(
            self.request(Method::POST, "/penghuni").json(draft),
            "Gagal menambah penghuni",
        )
        .await
    }

    async fn update_tenant(&self, id: Id, draft: &TenantDraft) -> Result<Tenant> {
        self.fetch_data(
            self.request(Method::PUT, &format!("/penghuni/{id}")).json(draft),
            "Gagal memperbarui penghuni",
        )
        .await
    }

    async fn delete_tenant(&self, id: Id) -> Result<()> {
        self.fetch_unit(
            self.request(Method::DELETE, &format!("/penghuni/{id}")),
            "Gagal menghapus penghuni",
        )
        .await
    }
}

#[async_trait]
impl BillingGateway for HttpGateway {
    async fn list_billings(&self) -> Result<Vec<Billing>> {
        self.fetch_data(self.request(Method::GET, "/tagihan"), "Gagal memuat data tagihan")
            .await
    }

    async fn create_billing(&self, draft: &BillingDraft) -> Result<Billing> {
        self.fetch_data(
            self.request(Method::POST, "/tagihan").json(draft),
            "Gagal membuat tagihan",
        )
        .await
    }

    async fn generate_billings(&self, request: &GenerateRequest) -> Result<GenerateOutcome> {
        self.fetch_data(
            self.request(Method::POST, "/tagihan/generate").json(request),
            "Gagal generate tagihan",
        )
        .await
    }

    async fn update_billing(&self, id: Id, changes: &BillingChanges) -> Result<Billing> {
        self.fetch_data(
            self.request(Method::PUT, &format!("/tagihan/{id}")).json(changes),
            "Gagal memperbarui tagihan",
        )
        .await
    }

    async fn delete_billing(&self, id: Id) -> Result<()> {
        self.fetch_unit(
            self.request(Method::DELETE, &format!("/tagihan/{id}")),
            "Gagal menghapus tagihan",
        )
        .await
    }

    async fn record_payment(&self, draft: &PaymentDraft) -> Result<Payment> {
        self.fetch_data(
            self.request(Method::POST, "/pembayaran").json(draft),
            "Gagal mencatat pembayaran",
        )
        .await
    }

    async fn list_payments(&self, billing_id: Id) -> Result<Vec<Payment>> {
        self.fetch_data(
            self.request(Method::GET, &format!("/pembayaran/tagihan/{billing_id}")),
            "Gagal memuat data pembayaran",
        )
        .await
    }

    async fn create_external_payment(&self, billing_id: Id) -> Result<PaymentRedirect> {
        self.fetch_data(
            self.request(Method::POST, &format!("/tagihan/{billing_id}/payment")),
            "Gagal membuat pembayaran online",
        )
        .await
    }

    async fn check_overdue(&self) -> Result<OverdueSweep> {
        self.fetch_data(
            self.request(Method::POST, "/tagihan/check-overdue"),
            "Gagal memeriksa tagihan terlambat",
        )
        .await
    }
}

#[async_trait]
impl ReminderGateway for HttpGateway {
    async fn list_reminders(&self) -> Result<Vec<Reminder>> {
        self.fetch_data(self.request(Method::GET, "/reminder"), "Gagal memuat reminder")
            .await
    }

    async fn list_reminders_by_tenant(&self, tenant_id: Id) -> Result<Vec<Reminder>> {
        self.fetch_data(
            self.request(Method::GET, &format!("/reminder/penghuni/{tenant_id}")),
            "Gagal memuat reminder",
        )
        .await
    }

    async fn create_reminder(&self, draft: &ReminderDraft) -> Result<Reminder> {
        self.fetch_data(
            self.request(Method::POST, "/reminder").json(draft),
            "Gagal membuat reminder",
        )
        .await
    }

    async fn update_reminder(&self, id: Id, draft: &ReminderDraft) -> Result<Reminder> {
        self.fetch_data(
            self.request(Method::PUT, &format!("/reminder/{id}")).json(draft),
            "Gagal memperbarui reminder",
        )
        .await
    }

    async fn delete_reminder(&self, id: Id) -> Result<()> {
        self.fetch_unit(
            self.request(Method::DELETE, &format!("/reminder/{id}")),
            "Gagal menghapus reminder",
        )
        .await
    }

    async fn test_reminder(&self, id: Id) -> Result<String> {
        let body: MessageBody = self
            .fetch_json(
                self.request(Method::POST, &format!("/reminder/{id}/test")),
                "Gagal mengirim reminder",
            )
            .await?;
        Ok(body.message.unwrap_or_else(|| "Reminder terkirim".into()))
    }
}

#[async_trait]
impl FaceGateway for HttpGateway {
    async fn upload_face(&self, tenant_id: Id, photo: Vec<u8>, filename: &str) -> Result<()> {
        let part = multipart::Part::bytes(photo)
            .file_name(filename.to_string())
            .mime_str("image/jpeg")
            .map_err(|_| KosError::validation("Format foto tidak didukung"))?;
        let form = multipart::Form::new().part("foto", part);
        self.fetch_unit(
            self.request(Method::POST, &format!("/face/upload/{tenant_id}"))
                .multipart(form)
                .timeout(self.upload_timeout),
            "Gagal upload foto wajah",
        )
        .await
    }

    async fn remove_face(&self, tenant_id: Id) -> Result<()> {
        self.fetch_unit(
            self.request(Method::DELETE, &format!("/face/upload/{tenant_id}")),
            "Gagal menghapus data wajah",
        )
        .await
    }

    async fn recognize(&self, image: &str) -> Result<Vec<Recognition>> {
        let body: RecognizeBody = self
            .fetch_json(
                self.request(Method::POST, "/face/recognize")
                    .json(&serde_json::json!({ "image": image }))
                    .timeout(self.upload_timeout),
                "Gagal mengenali wajah",
            )
            .await?;
        Ok(body.results)
    }

    async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<AccessLog>> {
        self.fetch_data(
            self.request(Method::GET, "/face/log").query(filter),
            "Gagal memuat log akses",
        )
        .await
    }

    async fn list_notifications(&self) -> Result<Vec<FaceNotification>> {
        self.fetch_data(
            self.request(Method::GET, "/face/notifikasi"),
            "Gagal memuat notifikasi",
        )
        .await
    }

    async fn mark_notification_read(&self, id: Id) -> Result<()> {
        self.fetch_unit(
            self.request(Method::PUT, &format!("/face/notifikasi/{id}/read")),
            "Gagal menandai notifikasi",
        )
        .await
    }

    async fn mark_all_notifications_read(&self) -> Result<()> {
        self.fetch_unit(
            self.request(Method::PUT, "/face/notifikasi/read-all"),
            "Gagal menandai semua notifikasi",
        )
        .await
    }

    async fn unread_count(&self) -> Result<u64> {
        let body: CountBody = self
            .fetch_json(
                self.request(Method::GET, "/face/notifikasi/unread-count"),
                "Gagal memuat jumlah notifikasi",
            )
            .await?;
        Ok(body.count)
    }

    async fn face_stats(&self) -> Result<FaceStats> {
        self.fetch_data(self.request(Method::GET, "/face/stats"), "Gagal memuat statistik wajah")
            .await
    }
}

#[async_trait]
impl AuthGateway for HttpGateway {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        self.fetch_json(
            self.request(Method::POST, "/auth/login").json(credentials),
            "Gagal login",
        )
        .await
    }

    async fn profile(&self) -> Result<AuthUser> {
        #[derive(Deserialize)]
        struct ProfileBody {
            user: AuthUser,
        }
        let body: ProfileBody = self
            .fetch_json(self.request(Method::GET, "/auth/profile"), "Gagal memuat profil")
            .await?;
        Ok(body.user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_message_prefers_payload() {
        assert_eq!(
            backend_message(br#"{"message":"Kamar sudah terisi"}"#).as_deref(),
            Some("Kamar sudah terisi")
        );
        assert_eq!(backend_message(br#"{"message":"  "}"#), None);
        assert_eq!(backend_message(b"<html>502</html>"), None);
    }
}
