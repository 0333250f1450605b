// models.rs
// Domain records as exchanged with the KosFlow backend (JSON field names are the backend's).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub type Id = i64;

/// Records cached by a store are keyed by their backend id.
pub trait Keyed {
    fn id(&self) -> Id;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoomType {
    Standard,
    Deluxe,
    #[serde(rename = "VIP")]
    Vip,
}

impl Default for RoomType {
    fn default() -> Self {
        RoomType::Standard
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RoomStatus {
    #[serde(rename = "Kosong")]
    Available,
    #[serde(rename = "Terisi")]
    Occupied,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "Kosong",
            RoomStatus::Occupied => "Terisi",
        }
    }
}

impl Default for RoomStatus {
    fn default() -> Self {
        RoomStatus::Available
    }
}

/// Rentable unit (kamar).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Room {
    pub id: Id,
    #[serde(rename = "nomor_kamar")]
    pub number: String,
    #[serde(rename = "tipe_kamar", default)]
    pub room_type: RoomType,
    #[serde(rename = "harga_per_bulan")]
    pub monthly_price: i64,
    #[serde(rename = "status_kamar", default)]
    pub status: RoomStatus,
}

impl Room {
    pub fn is_occupied(&self) -> bool {
        self.status == RoomStatus::Occupied
    }
}

impl Keyed for Room {
    fn id(&self) -> Id {
        self.id
    }
}

/// Person renting a room (penghuni).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    pub id: Id,
    #[serde(rename = "nama_penghuni")]
    pub name: String,
    #[serde(rename = "nomor_kontak", default)]
    pub contact: String,
    #[serde(rename = "tanggal_masuk", with = "backend_date")]
    pub move_in: NaiveDate,
    #[serde(rename = "kamar_id", default)]
    pub room_id: Option<Id>,
}

impl Tenant {
    /// Tenants holding a room are the ones billed each period.
    pub fn is_active(&self) -> bool {
        self.room_id.is_some()
    }
}

impl Keyed for Tenant {
    fn id(&self) -> Id {
        self.id
    }
}

/// Year-month a billing covers, written `YYYY-MM` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingPeriod {
    year: i32,
    month: u32,
}

const MONTH_NAMES: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

impl BillingPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) && (1900..=9999).contains(&year) {
            Some(BillingPeriod { year, month })
        } else {
            None
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        BillingPeriod {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn current() -> Self {
        Self::of(Utc::now().date_naive())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Human label, e.g. "Maret 2026".
    pub fn label(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for BillingPeriod {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (year, month) = raw
            .split_once('-')
            .ok_or_else(|| format!("periode tagihan tidak valid: {raw:?}"))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(format!("periode tagihan tidak valid: {raw:?}"));
        }
        let year = year
            .parse::<i32>()
            .map_err(|_| format!("periode tagihan tidak valid: {raw:?}"))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| format!("periode tagihan tidak valid: {raw:?}"))?;
        BillingPeriod::new(year, month).ok_or_else(|| format!("periode tagihan tidak valid: {raw:?}"))
    }
}

impl TryFrom<String> for BillingPeriod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingPeriod> for String {
    fn from(period: BillingPeriod) -> Self {
        period.to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BillingStatus {
    #[serde(rename = "Belum Bayar")]
    Unpaid,
    #[serde(rename = "Lunas")]
    Paid,
    #[serde(rename = "Terlambat")]
    Overdue,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Unpaid => "Belum Bayar",
            BillingStatus::Paid => "Lunas",
            BillingStatus::Overdue => "Terlambat",
        }
    }

    /// Unpaid and overdue billings still accept a payment.
    pub fn is_payable(&self) -> bool {
        !matches!(self, BillingStatus::Paid)
    }
}

/// One period's invoice owed by a tenant (tagihan).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Billing {
    pub id: Id,
    #[serde(rename = "penghuni_id")]
    pub tenant_id: Id,
    #[serde(rename = "bulan_tagihan")]
    pub period: BillingPeriod,
    #[serde(rename = "total_tagihan")]
    pub amount: i64,
    #[serde(rename = "tanggal_jatuh_tempo", with = "backend_date")]
    pub due_date: NaiveDate,
    #[serde(rename = "status_tagihan")]
    pub status: BillingStatus,
}

impl Billing {
    /// Unpaid with a due date strictly before `today`.
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        self.status == BillingStatus::Unpaid && self.due_date < today
    }

    pub fn days_late(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days().max(0)
    }
}

impl Keyed for Billing {
    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    #[serde(rename = "ewallet")]
    EWallet,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Tunai",
            PaymentMethod::Transfer => "Transfer Bank",
            PaymentMethod::EWallet => "E-Wallet",
        }
    }
}

/// Settlement of a billing (pembayaran).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Payment {
    pub id: Id,
    #[serde(rename = "tagihan_id")]
    pub billing_id: Id,
    #[serde(rename = "jumlah_bayar")]
    pub amount: i64,
    #[serde(rename = "metode_bayar")]
    pub method: PaymentMethod,
    #[serde(rename = "bukti_bayar", default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<String>,
    #[serde(rename = "tanggal_bayar")]
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReminderChannel {
    Whatsapp,
    Telegram,
    Email,
}

/// Scheduled due-date reminder for a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: Id,
    #[serde(rename = "penghuni_id")]
    pub tenant_id: Id,
    pub channel: ReminderChannel,
    #[serde(rename = "hari_sebelum")]
    pub days_before: u32,
    #[serde(rename = "pesan")]
    pub message: String,
    #[serde(rename = "aktif", default = "default_true")]
    pub active: bool,
}

impl Keyed for Reminder {
    fn id(&self) -> Id {
        self.id
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FaceStatus {
    #[serde(rename = "dikenal")]
    Known,
    #[serde(rename = "tidak_dikenal")]
    Unknown,
}

impl FaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceStatus::Known => "dikenal",
            FaceStatus::Unknown => "tidak_dikenal",
        }
    }
}

/// Door camera access record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessLog {
    pub id: Id,
    #[serde(rename = "penghuni_id", default)]
    pub tenant_id: Option<Id>,
    #[serde(rename = "nama", default)]
    pub name: Option<String>,
    pub status: FaceStatus,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(rename = "foto", default)]
    pub snapshot: Option<String>,
    #[serde(rename = "waktu")]
    pub recorded_at: DateTime<Utc>,
}

impl Keyed for AccessLog {
    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceNotification {
    pub id: Id,
    #[serde(rename = "log_akses_id", default)]
    pub log_id: Option<Id>,
    #[serde(rename = "pesan")]
    pub message: String,
    #[serde(rename = "sudah_dibaca", default)]
    pub read: bool,
    #[serde(rename = "waktu")]
    pub created_at: DateTime<Utc>,
}

impl Keyed for FaceNotification {
    fn id(&self) -> Id {
        self.id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

/// One face found in a submitted frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recognition {
    pub status: FaceStatus,
    #[serde(rename = "nama", default)]
    pub name: Option<String>,
    #[serde(rename = "penghuni_id", default)]
    pub tenant_id: Option<Id>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub location: BoundingBox,
}

impl Recognition {
    /// Key used to throttle repeated alerts for the same person.
    pub fn identity_key(&self) -> String {
        match (self.status, self.tenant_id) {
            (FaceStatus::Known, Some(id)) => format!("tenant:{id}"),
            (FaceStatus::Known, None) => format!("name:{}", self.name.as_deref().unwrap_or("-")),
            (FaceStatus::Unknown, _) => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FaceStats {
    #[serde(rename = "total_log", default)]
    pub total_logs: u64,
    #[serde(rename = "dikenal_hari_ini", default)]
    pub known_today: u64,
    #[serde(rename = "tidak_dikenal_hari_ini", default)]
    pub unknown_today: u64,
    #[serde(rename = "wajah_terdaftar", default)]
    pub registered_faces: u64,
}

/// Signed-in operator profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Id,
    pub username: String,
    pub email: String,
    #[serde(rename = "nama_lengkap", default)]
    pub full_name: String,
    #[serde(default)]
    pub role: String,
}

/// Formats whole rupiah with dot thousand separators: `Rp 800.000`.
pub fn format_rupiah(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}

/// Dates arrive either as `YYYY-MM-DD` or as a full timestamp; only the day matters.
pub(crate) mod backend_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let day = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_and_displays() {
        let period: BillingPeriod = "2026-03".parse().unwrap();
        assert_eq!(period.year(), 2026);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2026-03");
        assert_eq!(period.label(), "Maret 2026");
    }

    #[test]
    fn period_rejects_malformed_input() {
        for raw in ["", "2026", "2026-13", "2026-3", "26-03", "2026/03", "abcd-ef"] {
            assert!(raw.parse::<BillingPeriod>().is_err(), "{raw:?} should be rejected");
        }
    }

    #[test]
    fn billing_uses_backend_field_names() {
        let json = serde_json::json!({
            "id": 7,
            "penghuni_id": 3,
            "bulan_tagihan": "2026-03",
            "total_tagihan": 800000,
            "tanggal_jatuh_tempo": "2026-03-10T00:00:00.000Z",
            "status_tagihan": "Belum Bayar"
        });
        let billing: Billing = serde_json::from_value(json).unwrap();
        assert_eq!(billing.tenant_id, 3);
        assert_eq!(billing.status, BillingStatus::Unpaid);
        assert_eq!(billing.due_date, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());

        let back = serde_json::to_value(&billing).unwrap();
        assert_eq!(back["tanggal_jatuh_tempo"], "2026-03-10");
        assert_eq!(back["bulan_tagihan"], "2026-03");
    }

    #[test]
    fn room_status_defaults_to_available() {
        let json = serde_json::json!({
            "id": 1,
            "nomor_kamar": "Kamar 01",
            "tipe_kamar": "VIP",
            "harga_per_bulan": 800000
        });
        let room: Room = serde_json::from_value(json).unwrap();
        assert_eq!(room.room_type, RoomType::Vip);
        assert_eq!(room.status, RoomStatus::Available);
    }

    #[test]
    fn rupiah_groups_thousands() {
        assert_eq!(format_rupiah(0), "Rp 0");
        assert_eq!(format_rupiah(800_000), "Rp 800.000");
        assert_eq!(format_rupiah(1_500_000), "Rp 1.500.000");
        assert_eq!(format_rupiah(-950), "-Rp 950");
    }

    #[test]
    fn unknown_faces_share_one_identity() {
        let face = Recognition {
            status: FaceStatus::Unknown,
            name: None,
            tenant_id: None,
            confidence: 0.0,
            location: BoundingBox::default(),
        };
        assert_eq!(face.identity_key(), "unknown");
    }
}
