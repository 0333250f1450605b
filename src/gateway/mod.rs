// gateway/mod.rs
// Seams to the remote KosFlow backend.
//
// Every store talks to the backend through one of these traits. Two
// implementations exist: [`http::HttpGateway`] for the real REST API and
// [`memory::InMemoryBackend`], a complete local backend used for tests and
// offline development.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    AccessLog, AuthUser, Billing, BillingPeriod, BillingStatus, FaceNotification, FaceStats,
    FaceStatus, Id, Payment, PaymentMethod, Recognition, Reminder, ReminderChannel, Room,
    RoomStatus, RoomType, Tenant,
};

pub mod http;
pub mod memory;

pub use http::HttpGateway;
pub use memory::InMemoryBackend;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomDraft {
    #[serde(rename = "nomor_kamar")]
    pub number: String,
    #[serde(rename = "tipe_kamar")]
    pub room_type: RoomType,
    #[serde(rename = "harga_per_bulan")]
    pub monthly_price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantDraft {
    #[serde(rename = "nama_penghuni")]
    pub name: String,
    #[serde(rename = "nomor_kontak", default)]
    pub contact: String,
    #[serde(rename = "tanggal_masuk", with = "crate::models::backend_date")]
    pub move_in: NaiveDate,
    #[serde(rename = "kamar_id", default)]
    pub room_id: Option<Id>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BillingDraft {
    #[serde(rename = "penghuni_id")]
    pub tenant_id: Id,
    #[serde(rename = "bulan_tagihan")]
    pub period: BillingPeriod,
    #[serde(rename = "total_tagihan")]
    pub amount: i64,
    #[serde(rename = "tanggal_jatuh_tempo", with = "crate::models::backend_date")]
    pub due_date: NaiveDate,
}

/// One line of a bulk generation: the tenant and the room price copied at planning time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationLine {
    #[serde(rename = "penghuni_id")]
    pub tenant_id: Id,
    #[serde(rename = "total_tagihan")]
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateRequest {
    #[serde(rename = "bulan_tagihan")]
    pub period: BillingPeriod,
    #[serde(rename = "tanggal_jatuh_tempo", with = "crate::models::backend_date")]
    pub due_date: NaiveDate,
    #[serde(rename = "tagihan")]
    pub lines: Vec<GenerationLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct GenerateOutcome {
    #[serde(default)]
    pub created: Vec<Billing>,
    #[serde(default)]
    pub skipped: usize,
}

/// Partial update; absent fields are left as they are.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BillingChanges {
    #[serde(rename = "total_tagihan", default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(
        rename = "tanggal_jatuh_tempo",
        default,
        skip_serializing_if = "Option::is_none",
        with = "optional_date"
    )]
    pub due_date: Option<NaiveDate>,
    #[serde(rename = "status_tagihan", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BillingStatus>,
}

impl BillingChanges {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none() && self.due_date.is_none() && self.status.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentDraft {
    #[serde(rename = "tagihan_id")]
    pub billing_id: Id,
    #[serde(rename = "jumlah_bayar")]
    pub amount: i64,
    #[serde(rename = "metode_bayar")]
    pub method: PaymentMethod,
    #[serde(rename = "bukti_bayar", default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRedirect {
    pub redirect_url: String,
    pub order_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OverdueSweep {
    #[serde(default)]
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderDraft {
    #[serde(rename = "penghuni_id")]
    pub tenant_id: Id,
    pub channel: ReminderChannel,
    #[serde(rename = "hari_sebelum")]
    pub days_before: u32,
    #[serde(rename = "pesan")]
    pub message: String,
    #[serde(rename = "aktif", default)]
    pub active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FaceStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub token: String,
    pub user: AuthUser,
}

#[async_trait]
pub trait RoomGateway: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>>;
    async fn create_room(&self, draft: &RoomDraft) -> Result<Room>;
    async fn update_room(&self, id: Id, draft: &RoomDraft) -> Result<Room>;
    async fn delete_room(&self, id: Id) -> Result<()>;
    async fn update_room_status(&self, id: Id, status: RoomStatus) -> Result<Room>;
}

#[async_trait]
pub trait TenantGateway: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
    async fn create_tenant(&self, draft: &TenantDraft) -> Result<Tenant>;
    async fn update_tenant(&self, id: Id, draft: &TenantDraft) -> Result<Tenant>;
    async fn delete_tenant(&self, id: Id) -> Result<()>;
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn list_billings(&self) -> Result<Vec<Billing>>;
    async fn create_billing(&self, draft: &BillingDraft) -> Result<Billing>;
    /// Creates the given lines, skipping any (tenant, period) pair that already exists.
    async fn generate_billings(&self, request: &GenerateRequest) -> Result<GenerateOutcome>;
    async fn update_billing(&self, id: Id, changes: &BillingChanges) -> Result<Billing>;
    async fn delete_billing(&self, id: Id) -> Result<()>;
    async fn record_payment(&self, draft: &PaymentDraft) -> Result<Payment>;
    async fn list_payments(&self, billing_id: Id) -> Result<Vec<Payment>>;
    async fn create_external_payment(&self, billing_id: Id) -> Result<PaymentRedirect>;
    /// Marks every unpaid billing whose due date has passed as overdue.
    async fn check_overdue(&self) -> Result<OverdueSweep>;
}

#[async_trait]
pub trait ReminderGateway: Send + Sync {
    async fn list_reminders(&self) -> Result<Vec<Reminder>>;
    async fn list_reminders_by_tenant(&self, tenant_id: Id) -> Result<Vec<Reminder>>;
    async fn create_reminder(&self, draft: &ReminderDraft) -> Result<Reminder>;
    async fn update_reminder(&self, id: Id, draft: &ReminderDraft) -> Result<Reminder>;
    async fn delete_reminder(&self, id: Id) -> Result<()>;
    /// Sends the reminder once right now; returns the backend's confirmation message.
    async fn test_reminder(&self, id: Id) -> Result<String>;
}

#[async_trait]
pub trait FaceGateway: Send + Sync {
    async fn upload_face(&self, tenant_id: Id, photo: Vec<u8>, filename: &str) -> Result<()>;
    async fn remove_face(&self, tenant_id: Id) -> Result<()>;
    /// `image` is a `data:image/jpeg;base64,...` URL.
    async fn recognize(&self, image: &str) -> Result<Vec<Recognition>>;
    async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<AccessLog>>;
    async fn list_notifications(&self) -> Result<Vec<FaceNotification>>;
    async fn mark_notification_read(&self, id: Id) -> Result<()>;
    async fn mark_all_notifications_read(&self) -> Result<()>;
    async fn unread_count(&self) -> Result<u64>;
    async fn face_stats(&self) -> Result<FaceStats>;
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse>;
    async fn profile(&self) -> Result<AuthUser>;
}

/// Everything the admin service needs from one backend.
pub trait Backend:
    RoomGateway + TenantGateway + BillingGateway + ReminderGateway + FaceGateway + AuthGateway
{
}

impl<T> Backend for T where
    T: RoomGateway + TenantGateway + BillingGateway + ReminderGateway + FaceGateway + AuthGateway
{
}

mod optional_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_str(&date.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| {
            let day = raw.get(..10).unwrap_or(&raw).to_string();
            NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(D::Error::custom)
        })
        .transpose()
    }
}
