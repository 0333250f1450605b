// gateway/memory.rs
// Self-contained backend kept in process memory. Mirrors the REST backend's rules
// closely enough to run the admin service offline and to drive the test suite.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::{
        Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};
use uuid::Uuid;

use super::{
    AuthGateway, BillingChanges, BillingDraft, BillingGateway, Credentials, FaceGateway,
    GenerateOutcome, GenerateRequest, LogFilter, LoginResponse, OverdueSweep, PaymentDraft,
    PaymentRedirect, ReminderDraft, ReminderGateway, RoomDraft, RoomGateway, TenantDraft,
    TenantGateway,
};
use crate::error::{KosError, Result};
use crate::models::{
    AccessLog, AuthUser, Billing, BillingStatus, FaceNotification, FaceStats, FaceStatus, Id,
    Payment, Recognition, Reminder, Room, RoomStatus, RoomType, Tenant,
};

#[derive(Default)]
struct Tables {
    next_id: Id,
    rooms: BTreeMap<Id, Room>,
    tenants: BTreeMap<Id, Tenant>,
    billings: BTreeMap<Id, Billing>,
    payments: Vec<Payment>,
    reminders: BTreeMap<Id, Reminder>,
    faces: HashSet<Id>,
    logs: Vec<AccessLog>,
    notifications: Vec<FaceNotification>,
    recognitions: VecDeque<Vec<Recognition>>,
    tokens: HashSet<String>,
}

impl Tables {
    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn room_holder(&self, room_id: Id) -> Option<&Tenant> {
        self.tenants.values().find(|t| t.room_id == Some(room_id))
    }

    fn has_billing(&self, tenant_id: Id, period: crate::models::BillingPeriod) -> bool {
        self.billings
            .values()
            .any(|b| b.tenant_id == tenant_id && b.period == period)
    }
}

pub struct InMemoryBackend {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    today: Mutex<Option<NaiveDate>>,
    operator: AuthUser,
    password: String,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Empty backend with a single `admin` / `admin` operator.
    pub fn new() -> Self {
        InMemoryBackend {
            tables: Mutex::new(Tables::default()),
            offline: AtomicBool::new(false),
            today: Mutex::new(None),
            operator: AuthUser {
                id: 1,
                username: "admin".into(),
                email: "admin@kosflow.com".into(),
                full_name: "Admin".into(),
                role: "admin".into(),
            },
            password: "admin".into(),
        }
    }

    /// Backend pre-filled with a handful of rooms and tenants for local development.
    pub fn seeded() -> Self {
        let backend = Self::new();
        {
            let mut tables = backend.tables();
            let today = Utc::now().date_naive();
            let rooms = [
                ("Kamar 01", RoomType::Standard, 800_000),
                ("Kamar 02", RoomType::Standard, 800_000),
                ("Kamar 03", RoomType::Deluxe, 1_200_000),
                ("Kamar 04", RoomType::Vip, 1_500_000),
            ];
            let mut room_ids = Vec::new();
            for (number, room_type, price) in rooms {
                let id = tables.allocate_id();
                tables.rooms.insert(
                    id,
                    Room {
                        id,
                        number: number.into(),
                        room_type,
                        monthly_price: price,
                        status: RoomStatus::Available,
                    },
                );
                room_ids.push(id);
            }
            for (name, contact, room_id) in [
                ("Budi Santoso", "081234567890", room_ids[0]),
                ("Sarah Wijaya", "081298765432", room_ids[2]),
            ] {
                let id = tables.allocate_id();
                tables.tenants.insert(
                    id,
                    Tenant {
                        id,
                        name: name.into(),
                        contact: contact.into(),
                        move_in: today,
                        room_id: Some(room_id),
                    },
                );
                if let Some(room) = tables.rooms.get_mut(&room_id) {
                    room.status = RoomStatus::Occupied;
                }
            }
        }
        backend
    }

    /// Simulates the backend being unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Pins the date used by the overdue sweep.
    pub fn set_today(&self, today: NaiveDate) {
        *self.today.lock().unwrap_or_else(PoisonError::into_inner) = Some(today);
    }

    /// Queues the result of the next `recognize` call.
    pub fn queue_recognition(&self, results: Vec<Recognition>) {
        self.tables().recognitions.push_back(results);
    }

    pub fn billing_count(&self) -> usize {
        self.tables().billings.len()
    }

    pub fn payment_count(&self) -> usize {
        self.tables().payments.len()
    }

    fn today(&self) -> NaiveDate {
        self.today
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the tables after checking connectivity.
    fn connect(&self) -> Result<MutexGuard<'_, Tables>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(KosError::fetch(None, "Tidak dapat terhubung ke server"));
        }
        Ok(self.tables())
    }
}

fn bad_request(message: &str) -> KosError {
    KosError::fetch(Some(400), message)
}

fn not_found(message: &str) -> KosError {
    KosError::fetch(Some(404), message)
}

fn conflict(message: &str) -> KosError {
    KosError::fetch(Some(409), message)
}

fn check_room_draft(tables: &Tables, draft: &RoomDraft, editing: Option<Id>) -> Result<()> {
    if draft.number.trim().is_empty() {
        return Err(bad_request("Nomor kamar wajib diisi"));
    }
    if draft.monthly_price <= 0 {
        return Err(bad_request("Harga kamar harus lebih dari 0"));
    }
    let taken = tables.rooms.values().any(|r| {
        Some(r.id) != editing && r.number.trim().eq_ignore_ascii_case(draft.number.trim())
    });
    if taken {
        return Err(conflict("Nomor kamar sudah digunakan"));
    }
    Ok(())
}

fn check_tenant_draft(tables: &Tables, draft: &TenantDraft, editing: Option<Id>) -> Result<()> {
    if draft.name.trim().is_empty() {
        return Err(bad_request("Nama penghuni wajib diisi"));
    }
    if let Some(room_id) = draft.room_id {
        if !tables.rooms.contains_key(&room_id) {
            return Err(not_found("Kamar tidak ditemukan"));
        }
        if let Some(holder) = tables.room_holder(room_id) {
            if Some(holder.id) != editing {
                return Err(conflict("Kamar sudah terisi"));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl RoomGateway for InMemoryBackend {
    async fn list_rooms(&self) -> Result<Vec<Room>> {
        Ok(self.connect()?.rooms.values().cloned().collect())
    }

    async fn create_room(&self, draft: &RoomDraft) -> Result<Room> {
        let mut tables = self.connect()?;
        check_room_draft(&tables, draft, None)?;
        let id = tables.allocate_id();
        let room = Room {
            id,
            number: draft.number.trim().to_string(),
            room_type: draft.room_type,
            monthly_price: draft.monthly_price,
            status: RoomStatus::Available,
        };
        tables.rooms.insert(id, room.clone());
        Ok(room)
    }

    async fn update_room(&self, id: Id, draft: &RoomDraft) -> Result<Room> {
        let mut tables = self.connect()?;
        check_room_draft(&tables, draft, Some(id))?;
        let room = tables
            .rooms
            .get_mut(&id)
            .ok_or_else(|| not_found("Kamar tidak ditemukan"))?;
        room.number = draft.number.trim().to_string();
        room.room_type = draft.room_type;
        room.monthly_price = draft.monthly_price;
        Ok(room.clone())
    }

    async fn delete_room(&self, id: Id) -> Result<()> {
        let mut tables = self.connect()?;
        if tables.room_holder(id).is_some() {
            return Err(conflict("Kamar masih terisi, pindahkan penghuni terlebih dahulu"));
        }
        tables
            .rooms
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Kamar tidak ditemukan"))
    }

    async fn update_room_status(&self, id: Id, status: RoomStatus) -> Result<Room> {
        let mut tables = self.connect()?;
        let room = tables
            .rooms
            .get_mut(&id)
            .ok_or_else(|| not_found("Kamar tidak ditemukan"))?;
        room.status = status;
        Ok(room.clone())
    }
}

#[async_trait]
impl TenantGateway for InMemoryBackend {
    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        Ok(self.connect()?.tenants.values().cloned().collect())
    }

    async fn create_tenant(&self, draft: &TenantDraft) -> Result<Tenant> {
        let mut tables = self.connect()?;
        check_tenant_draft(&tables, draft, None)?;
        let id = tables.allocate_id();
        let tenant = Tenant {
            id,
            name: draft.name.trim().to_string(),
            contact: draft.contact.trim().to_string(),
            move_in: draft.move_in,
            room_id: draft.room_id,
        };
        tables.tenants.insert(id, tenant.clone());
        Ok(tenant)
    }

    async fn update_tenant(&self, id: Id, draft: &TenantDraft) -> Result<Tenant> {
        let mut tables = self.connect()?;
        check_tenant_draft(&tables, draft, Some(id))?;
        let tenant = tables
            .tenants
            .get_mut(&id)
            .ok_or_else(|| not_found("Penghuni tidak ditemukan"))?;
        tenant.name = draft.name.trim().to_string();
        tenant.contact = draft.contact.trim().to_string();
        tenant.move_in = draft.move_in;
        tenant.room_id = draft.room_id;
        Ok(tenant.clone())
    }

    async fn delete_tenant(&self, id: Id) -> Result<()> {
        let mut tables = self.connect()?;
        tables
            .tenants
            .remove(&id)
            .ok_or_else(|| not_found("Penghuni tidak ditemukan"))?;
        tables.reminders.retain(|_, r| r.tenant_id != id);
        tables.faces.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BillingGateway for InMemoryBackend {
    async fn list_billings(&self) -> Result<Vec<Billing>> {
        Ok(self.connect()?.billings.values().cloned().collect())
    }

    async fn create_billing(&self, draft: &BillingDraft) -> Result<Billing> {
        let mut tables = self.connect()?;
        if draft.amount <= 0 {
            return Err(bad_request("Total tagihan harus lebih dari 0"));
        }
        if !tables.tenants.contains_key(&draft.tenant_id) {
            return Err(not_found("Penghuni tidak ditemukan"));
        }
        if tables.has_billing(draft.tenant_id, draft.period) {
            return Err(conflict("Tagihan untuk periode ini sudah ada"));
        }
        let id = tables.allocate_id();
        let billing = Billing {
            id,
            tenant_id: draft.tenant_id,
            period: draft.period,
            amount: draft.amount,
            due_date: draft.due_date,
            status: BillingStatus::Unpaid,
        };
        tables.billings.insert(id, billing.clone());
        Ok(billing)
    }

    async fn generate_billings(&self, request: &GenerateRequest) -> Result<GenerateOutcome> {
        let mut tables = self.connect()?;
        let mut outcome = GenerateOutcome::default();
        for line in &request.lines {
            let eligible = tables
                .tenants
                .get(&line.tenant_id)
                .is_some_and(|t| t.is_active());
            if !eligible || line.amount <= 0 || tables.has_billing(line.tenant_id, request.period) {
                outcome.skipped += 1;
                continue;
            }
            let id = tables.allocate_id();
            let billing = Billing {
                id,
                tenant_id: line.tenant_id,
                period: request.period,
                amount: line.amount,
                due_date: request.due_date,
                status: BillingStatus::Unpaid,
            };
            tables.billings.insert(id, billing.clone());
            outcome.created.push(billing);
        }
        Ok(outcome)
    }

    async fn update_billing(&self, id: Id, changes: &BillingChanges) -> Result<Billing> {
        let mut tables = self.connect()?;
        if changes.amount.is_some_and(|amount| amount <= 0) {
            return Err(bad_request("Total tagihan harus lebih dari 0"));
        }
        let billing = tables
            .billings
            .get_mut(&id)
            .ok_or_else(|| not_found("Tagihan tidak ditemukan"))?;
        if let Some(amount) = changes.amount {
            billing.amount = amount;
        }
        if let Some(due_date) = changes.due_date {
            billing.due_date = due_date;
        }
        if let Some(status) = changes.status {
            billing.status = status;
        }
        Ok(billing.clone())
    }

    async fn delete_billing(&self, id: Id) -> Result<()> {
        let mut tables = self.connect()?;
        tables
            .billings
            .remove(&id)
            .ok_or_else(|| not_found("Tagihan tidak ditemukan"))?;
        tables.payments.retain(|p| p.billing_id != id);
        Ok(())
    }

    async fn record_payment(&self, draft: &PaymentDraft) -> Result<Payment> {
        let mut tables = self.connect()?;
        if draft.amount <= 0 {
            return Err(bad_request("Jumlah bayar harus lebih dari 0"));
        }
        let billing = tables
            .billings
            .get_mut(&draft.billing_id)
            .ok_or_else(|| not_found("Tagihan tidak ditemukan"))?;
        if !billing.status.is_payable() {
            return Err(conflict("Tagihan sudah lunas"));
        }
        billing.status = BillingStatus::Paid;
        let id = tables.allocate_id();
        let payment = Payment {
            id,
            billing_id: draft.billing_id,
            amount: draft.amount,
            method: draft.method,
            proof: draft.proof.clone(),
            paid_at: Utc::now(),
        };
        tables.payments.push(payment.clone());
        Ok(payment)
    }

    async fn list_payments(&self, billing_id: Id) -> Result<Vec<Payment>> {
        Ok(self
            .connect()?
            .payments
            .iter()
            .filter(|p| p.billing_id == billing_id)
            .cloned()
            .collect())
    }

    async fn create_external_payment(&self, billing_id: Id) -> Result<PaymentRedirect> {
        let tables = self.connect()?;
        let billing = tables
            .billings
            .get(&billing_id)
            .ok_or_else(|| not_found("Tagihan tidak ditemukan"))?;
        if !billing.status.is_payable() {
            return Err(conflict("Tagihan sudah lunas"));
        }
        let token = Uuid::new_v4().simple().to_string();
        Ok(PaymentRedirect {
            redirect_url: format!("http://localhost:8080/pay/{token}"),
            order_id: format!("KOS-{billing_id}-{}", &token[..8]),
        })
    }

    async fn check_overdue(&self) -> Result<OverdueSweep> {
        let today = self.today();
        let mut tables = self.connect()?;
        let mut sweep = OverdueSweep::default();
        for billing in tables.billings.values_mut() {
            if billing.is_past_due(today) {
                billing.status = BillingStatus::Overdue;
                sweep.updated += 1;
            }
        }
        Ok(sweep)
    }
}

fn check_reminder_draft(tables: &Tables, draft: &ReminderDraft) -> Result<()> {
    if draft.message.trim().is_empty() {
        return Err(bad_request("Pesan reminder wajib diisi"));
    }
    if !tables.tenants.contains_key(&draft.tenant_id) {
        return Err(not_found("Penghuni tidak ditemukan"));
    }
    Ok(())
}

#[async_trait]
impl ReminderGateway for InMemoryBackend {
    async fn list_reminders(&self) -> Result<Vec<Reminder>> {
        Ok(self.connect()?.reminders.values().cloned().collect())
    }

    async fn list_reminders_by_tenant(&self, tenant_id: Id) -> Result<Vec<Reminder>> {
        Ok(self
            .connect()?
            .reminders
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn create_reminder(&self, draft: &ReminderDraft) -> Result<Reminder> {
        let mut tables = self.connect()?;
        check_reminder_draft(&tables, draft)?;
        let id = tables.allocate_id();
        let reminder = Reminder {
            id,
            tenant_id: draft.tenant_id,
            channel: draft.channel,
            days_before: draft.days_before,
            message: draft.message.clone(),
            active: draft.active,
        };
        tables.reminders.insert(id, reminder.clone());
        Ok(reminder)
    }

    async fn update_reminder(&self, id: Id, draft: &ReminderDraft) -> Result<Reminder> {
        let mut tables = self.connect()?;
        check_reminder_draft(&tables, draft)?;
        let reminder = tables
            .reminders
            .get_mut(&id)
            .ok_or_else(|| not_found("Reminder tidak ditemukan"))?;
        reminder.tenant_id = draft.tenant_id;
        reminder.channel = draft.channel;
        reminder.days_before = draft.days_before;
        reminder.message = draft.message.clone();
        reminder.active = draft.active;
        Ok(reminder.clone())
    }

    async fn delete_reminder(&self, id: Id) -> Result<()> {
        self.connect()?
            .reminders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Reminder tidak ditemukan"))
    }

    async fn test_reminder(&self, id: Id) -> Result<String> {
        let tables = self.connect()?;
        let reminder = tables
            .reminders
            .get(&id)
            .ok_or_else(|| not_found("Reminder tidak ditemukan"))?;
        let name = tables
            .tenants
            .get(&reminder.tenant_id)
            .map(|t| t.name.as_str())
            .unwrap_or("-");
        Ok(format!("Reminder uji coba dikirim ke {name}"))
    }
}

#[async_trait]
impl FaceGateway for InMemoryBackend {
    async fn upload_face(&self, tenant_id: Id, photo: Vec<u8>, _filename: &str) -> Result<()> {
        let mut tables = self.connect()?;
        if photo.is_empty() {
            return Err(bad_request("Foto wajah kosong"));
        }
        if !tables.tenants.contains_key(&tenant_id) {
            return Err(not_found("Penghuni tidak ditemukan"));
        }
        tables.faces.insert(tenant_id);
        Ok(())
    }

    async fn remove_face(&self, tenant_id: Id) -> Result<()> {
        if self.connect()?.faces.remove(&tenant_id) {
            Ok(())
        } else {
            Err(not_found("Data wajah tidak ditemukan"))
        }
    }

    async fn recognize(&self, image: &str) -> Result<Vec<Recognition>> {
        let mut tables = self.connect()?;
        if image.is_empty() {
            return Err(bad_request("Gambar wajib dikirim"));
        }
        let results = tables.recognitions.pop_front().unwrap_or_default();
        let now = Utc::now();
        for result in &results {
            let log_id = tables.allocate_id();
            tables.logs.push(AccessLog {
                id: log_id,
                tenant_id: result.tenant_id,
                name: result.name.clone(),
                status: result.status,
                confidence: Some(result.confidence),
                snapshot: None,
                recorded_at: now,
            });
            if result.status == FaceStatus::Unknown {
                let id = tables.allocate_id();
                tables.notifications.push(FaceNotification {
                    id,
                    log_id: Some(log_id),
                    message: "Orang tidak dikenal terdeteksi di kamera".into(),
                    read: false,
                    created_at: now,
                });
            }
        }
        Ok(results)
    }

    async fn list_logs(&self, filter: &LogFilter) -> Result<Vec<AccessLog>> {
        let tables = self.connect()?;
        let mut logs: Vec<AccessLog> = tables
            .logs
            .iter()
            .filter(|log| filter.status.is_none_or(|status| log.status == status))
            .cloned()
            .collect();
        logs.reverse();
        Ok(logs)
    }

    async fn list_notifications(&self) -> Result<Vec<FaceNotification>> {
        let mut notifications = self.connect()?.notifications.clone();
        notifications.reverse();
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: Id) -> Result<()> {
        let mut tables = self.connect()?;
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| not_found("Notifikasi tidak ditemukan"))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self) -> Result<()> {
        for notification in self.connect()?.notifications.iter_mut() {
            notification.read = true;
        }
        Ok(())
    }

    async fn unread_count(&self) -> Result<u64> {
        Ok(self
            .connect()?
            .notifications
            .iter()
            .filter(|n| !n.read)
            .count() as u64)
    }

    async fn face_stats(&self) -> Result<FaceStats> {
        let today = self.today();
        let tables = self.connect()?;
        let todays = |status: FaceStatus| {
            tables
                .logs
                .iter()
                .filter(|l| l.status == status && l.recorded_at.date_naive() == today)
                .count() as u64
        };
        Ok(FaceStats {
            total_logs: tables.logs.len() as u64,
            known_today: todays(FaceStatus::Known),
            unknown_today: todays(FaceStatus::Unknown),
            registered_faces: tables.faces.len() as u64,
        })
    }
}

#[async_trait]
impl AuthGateway for InMemoryBackend {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let mut tables = self.connect()?;
        let login = credentials.email.trim();
        let known = login.eq_ignore_ascii_case(&self.operator.email)
            || login.eq_ignore_ascii_case(&self.operator.username);
        if !known || credentials.password != self.password {
            return Err(KosError::Auth("Username atau password salah".into()));
        }
        let token = Uuid::new_v4().to_string();
        tables.tokens.insert(token.clone());
        Ok(LoginResponse {
            token,
            user: self.operator.clone(),
        })
    }

    async fn profile(&self) -> Result<AuthUser> {
        drop(self.connect()?);
        Ok(self.operator.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GenerationLine;
    use crate::models::BillingPeriod;

    fn period() -> BillingPeriod {
        "2026-03".parse().unwrap()
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[tokio::test]
    async fn generate_skips_existing_pairs() {
        let backend = InMemoryBackend::seeded();
        let tenants = backend.list_tenants().await.unwrap();
        let lines: Vec<GenerationLine> = tenants
            .iter()
            .map(|t| GenerationLine {
                tenant_id: t.id,
                amount: 800_000,
            })
            .collect();
        let request = GenerateRequest {
            period: period(),
            due_date: due(),
            lines,
        };

        let first = backend.generate_billings(&request).await.unwrap();
        assert_eq!(first.created.len(), tenants.len());
        let second = backend.generate_billings(&request).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.skipped, tenants.len());
        assert_eq!(backend.billing_count(), tenants.len());
    }

    #[tokio::test]
    async fn tenant_cannot_take_a_held_room() {
        let backend = InMemoryBackend::seeded();
        let held = backend.list_tenants().await.unwrap()[0].room_id;
        let err = backend
            .create_tenant(&TenantDraft {
                name: "Rina".into(),
                contact: String::new(),
                move_in: due(),
                room_id: held,
            })
            .await
            .unwrap_err();
        assert_eq!(err, KosError::fetch(Some(409), "Kamar sudah terisi"));
    }

    #[tokio::test]
    async fn offline_backend_reports_fetch_error() {
        let backend = InMemoryBackend::new();
        backend.set_offline(true);
        let err = backend.list_rooms().await.unwrap_err();
        assert!(matches!(err, KosError::Fetch { status: None, .. }));
    }

    #[tokio::test]
    async fn unknown_face_raises_notification() {
        let backend = InMemoryBackend::new();
        backend.queue_recognition(vec![Recognition {
            status: FaceStatus::Unknown,
            name: None,
            tenant_id: None,
            confidence: 0.0,
            location: Default::default(),
        }]);
        let results = backend.recognize("data:image/jpeg;base64,AA==").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(backend.unread_count().await.unwrap(), 1);
        let logs = backend
            .list_logs(&LogFilter {
                status: Some(FaceStatus::Known),
            })
            .await
            .unwrap();
        assert!(logs.is_empty());
    }
}
