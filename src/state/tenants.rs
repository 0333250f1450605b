// state/tenants.rs
// Tenant cache and the room checks around assigning one.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{KosError, Result};
use crate::gateway::{TenantDraft, TenantGateway};
use crate::models::{Id, Tenant};
use crate::occupancy::{RoomChange, RoomOccupancyCoordinator};

use super::cache::{Collection, Snapshot};
use super::rooms::RoomStore;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct TenantSummary {
    pub total: usize,
    pub with_room: usize,
}

/// Tenant cache. Every mutation hands its room effect to the occupancy
/// coordinator and then re-reads rooms so both collections stay in step.
pub struct TenantStore {
    gateway: Arc<dyn TenantGateway>,
    tenants: Collection<Tenant>,
    rooms: Arc<RoomStore>,
    occupancy: Arc<dyn RoomOccupancyCoordinator>,
}

impl TenantStore {
    pub fn new(
        gateway: Arc<dyn TenantGateway>,
        rooms: Arc<RoomStore>,
        occupancy: Arc<dyn RoomOccupancyCoordinator>,
    ) -> Self {
        TenantStore {
            gateway,
            tenants: Collection::new(),
            rooms,
            occupancy,
        }
    }

    pub async fn refresh(&self) -> Result<()> {
        self.tenants.sync("tenants", self.gateway.list_tenants()).await
    }

    pub async fn snapshot(&self) -> Snapshot<Tenant> {
        self.tenants.snapshot().await
    }

    pub async fn list(&self) -> Vec<Tenant> {
        self.tenants.items().await
    }

    pub async fn get(&self, id: Id) -> Option<Tenant> {
        self.tenants.get(id).await
    }

    /// Tenant `id`, re-reading the list once if it is not cached yet.
    pub async fn require(&self, id: Id) -> Result<Tenant> {
        self.tenants
            .lookup("tenants", id, || self.gateway.list_tenants())
            .await?
            .ok_or(KosError::NotFound {
                entity: "Penghuni",
                id,
            })
    }

    pub async fn by_room(&self, room_id: Id) -> Option<Tenant> {
        self.tenants
            .with_records(|tenants| tenants.iter().find(|t| t.room_id == Some(room_id)).cloned())
            .await
    }

    pub async fn summary(&self) -> TenantSummary {
        self.tenants
            .with_records(|tenants| TenantSummary {
                total: tenants.len(),
                with_room: tenants.iter().filter(|t| t.is_active()).count(),
            })
            .await
    }

    pub async fn create(&self, draft: TenantDraft) -> Result<Tenant> {
        let draft = self.validate(draft, None).await?;
        let tenant = self
            .tenants
            .mutate("tenants", self.gateway.create_tenant(&draft))
            .await?;
        tracing::info!(tenant_id = tenant.id, room_id = ?tenant.room_id, "tenant created");
        self.after_change(RoomChange::assign(tenant.room_id)).await?;
        Ok(tenant)
    }

    pub async fn update(&self, id: Id, draft: TenantDraft) -> Result<Tenant> {
        let previous = self.require(id).await?;
        let draft = self.validate(draft, Some(id)).await?;
        let tenant = self
            .tenants
            .mutate("tenants", self.gateway.update_tenant(id, &draft))
            .await?;
        let mut change = RoomChange::moved(previous.room_id, tenant.room_id);
        if let Some(room_id) = tenant.room_id.filter(|_| change.transitions().is_empty()) {
            // Saving again repairs a room left unmarked by an earlier failed update.
            if self.rooms.get(room_id).await.is_some_and(|room| !room.is_occupied()) {
                change = RoomChange::assign(Some(room_id));
            }
        }
        self.after_change(change).await?;
        Ok(tenant)
    }

    pub async fn delete(&self, id: Id) -> Result<()> {
        let previous = self.require(id).await?;
        self.tenants
            .mutate("tenants", self.gateway.delete_tenant(id))
            .await?;
        tracing::info!(tenant_id = id, "tenant deleted");
        self.after_change(RoomChange::release(previous.room_id)).await
    }

    async fn validate(&self, draft: TenantDraft, editing: Option<Id>) -> Result<TenantDraft> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(KosError::validation("Nama penghuni wajib diisi"));
        }
        if let Some(room_id) = draft.room_id {
            // The holder check needs current tenants, not whatever was cached last.
            self.refresh().await?;
            let room = match self.rooms.require(room_id).await {
                Ok(room) => room,
                Err(KosError::NotFound { .. }) => {
                    return Err(KosError::validation("Kamar yang dipilih tidak ditemukan"));
                }
                Err(err) => return Err(err),
            };
            if let Some(holder) = self.by_room(room_id).await {
                if Some(holder.id) != editing {
                    return Err(KosError::validation(format!(
                        "{} sudah ditempati {}",
                        room.number, holder.name
                    )));
                }
            }
        }
        Ok(TenantDraft {
            name: name.to_string(),
            contact: draft.contact.trim().to_string(),
            ..draft
        })
    }

    /// The tenant is already saved when this runs, so an occupancy failure says so
    /// in its message; saving the tenant again retries the room update.
    async fn after_change(&self, change: RoomChange) -> Result<()> {
        let reconciled = self.occupancy.reconcile(change).await;
        let refreshed = self.refresh().await.and(self.rooms.refresh().await);
        let Err(err) = reconciled else {
            return refreshed;
        };
        tracing::error!(error = %err, ?change, "room occupancy update failed");
        let err = match err {
            KosError::Fetch { status, message } => KosError::fetch(
                status,
                format!("Data penghuni tersimpan, tetapi status kamar gagal diperbarui: {message}"),
            ),
            other => other,
        };
        self.tenants.fail(&err).await;
        Err(err)
    }
}
