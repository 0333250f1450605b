// state/reminders.rs
// Payment reminder cache and the test send.

use std::sync::Arc;

use crate::error::{KosError, Result};
use crate::gateway::{ReminderDraft, ReminderGateway};
use crate::models::{Id, Reminder};

use super::cache::{Collection, Snapshot};

/// Longest lead time a reminder may be scheduled ahead of the due date.
const MAX_DAYS_BEFORE: u32 = 30;

pub struct ReminderStore {
    gateway: Arc<dyn ReminderGateway>,
    reminders: Collection<Reminder>,
}

impl ReminderStore {
    pub fn new(gateway: Arc<dyn ReminderGateway>) -> Self {
        ReminderStore {
            gateway,
            reminders: Collection::new(),
        }
    }

    pub async fn refresh(&self) -> Result<()> {
        self.reminders
            .sync("reminders", self.gateway.list_reminders())
            .await
    }

    pub async fn snapshot(&self) -> Snapshot<Reminder> {
        self.reminders.snapshot().await
    }

    pub async fn get(&self, id: Id) -> Option<Reminder> {
        self.reminders.get(id).await
    }

    /// Reminder `id`, re-reading the list once if it is not cached yet.
    pub async fn require(&self, id: Id) -> Result<Reminder> {
        self.reminders
            .lookup("reminders", id, || self.gateway.list_reminders())
            .await?
            .ok_or(KosError::NotFound {
                entity: "Reminder",
                id,
            })
    }

    /// Fetched straight from the backend; the shared cache is left alone.
    pub async fn by_tenant(&self, tenant_id: Id) -> Result<Vec<Reminder>> {
        self.gateway.list_reminders_by_tenant(tenant_id).await
    }

    pub async fn create(&self, draft: ReminderDraft) -> Result<Reminder> {
        let draft = validate(draft)?;
        let reminder = self
            .reminders
            .mutate("reminders", self.gateway.create_reminder(&draft))
            .await?;
        tracing::info!(reminder_id = reminder.id, tenant_id = reminder.tenant_id, "reminder created");
        self.refresh().await?;
        Ok(reminder)
    }

    pub async fn update(&self, id: Id, draft: ReminderDraft) -> Result<Reminder> {
        let draft = validate(draft)?;
        let reminder = self
            .reminders
            .mutate("reminders", self.gateway.update_reminder(id, &draft))
            .await?;
        self.refresh().await?;
        Ok(reminder)
    }

    pub async fn delete(&self, id: Id) -> Result<()> {
        self.reminders
            .mutate("reminders", self.gateway.delete_reminder(id))
            .await?;
        self.refresh().await
    }

    /// Sends the reminder once, outside its schedule.
    pub async fn test_send(&self, id: Id) -> Result<String> {
        let message = self.gateway.test_reminder(id).await?;
        tracing::info!(reminder_id = id, "test reminder sent");
        Ok(message)
    }
}

fn validate(draft: ReminderDraft) -> Result<ReminderDraft> {
    let message = draft.message.trim();
    if message.is_empty() {
        return Err(KosError::validation("Pesan reminder wajib diisi"));
    }
    if draft.days_before > MAX_DAYS_BEFORE {
        return Err(KosError::validation(format!(
            "Hari sebelum jatuh tempo maksimal {MAX_DAYS_BEFORE}"
        )));
    }
    Ok(ReminderDraft {
        message: message.to_string(),
        ..draft
    })
}
