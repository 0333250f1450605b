// state/rooms.rs
// Room cache and occupancy figures.

use serde::Serialize;
use std::sync::Arc;

use crate::error::{KosError, Result};
use crate::gateway::{RoomDraft, RoomGateway};
use crate::models::{Id, Room, RoomStatus};

use super::cache::{Collection, Snapshot};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct RoomSummary {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
}

pub struct RoomStore {
    gateway: Arc<dyn RoomGateway>,
    rooms: Collection<Room>,
}

impl RoomStore {
    pub fn new(gateway: Arc<dyn RoomGateway>) -> Self {
        RoomStore {
            gateway,
            rooms: Collection::new(),
        }
    }

    pub async fn refresh(&self) -> Result<()> {
        self.rooms.sync("rooms", self.gateway.list_rooms()).await
    }

    pub async fn snapshot(&self) -> Snapshot<Room> {
        self.rooms.snapshot().await
    }

    pub async fn list(&self) -> Vec<Room> {
        self.rooms.items().await
    }

    pub async fn get(&self, id: Id) -> Option<Room> {
        self.rooms.get(id).await
    }

    /// Room `id`, re-reading the list once if it is not cached yet.
    pub async fn require(&self, id: Id) -> Result<Room> {
        self.rooms
            .lookup("rooms", id, || self.gateway.list_rooms())
            .await?
            .ok_or(KosError::NotFound { entity: "Kamar", id })
    }

    pub async fn create(&self, draft: RoomDraft) -> Result<Room> {
        let draft = validate_draft(draft)?;
        let room = self
            .rooms
            .mutate("rooms", self.gateway.create_room(&draft))
            .await?;
        tracing::info!(room_id = room.id, number = %room.number, "room created");
        self.refresh().await?;
        Ok(room)
    }

    /// Changes number, type or price. Existing billings keep the amount they were created with.
    pub async fn update(&self, id: Id, draft: RoomDraft) -> Result<Room> {
        let draft = validate_draft(draft)?;
        let room = self
            .rooms
            .mutate("rooms", self.gateway.update_room(id, &draft))
            .await?;
        self.refresh().await?;
        Ok(room)
    }

    pub async fn delete(&self, id: Id) -> Result<()> {
        let cached = self
            .rooms
            .lookup("rooms", id, || self.gateway.list_rooms())
            .await?;
        if let Some(room) = cached {
            if room.is_occupied() {
                return Err(KosError::invalid_state(format!(
                    "{} masih terisi dan tidak dapat dihapus",
                    room.number
                )));
            }
        }
        self.rooms
            .mutate("rooms", self.gateway.delete_room(id))
            .await?;
        tracing::info!(room_id = id, "room deleted");
        self.refresh().await
    }

    pub async fn summary(&self) -> RoomSummary {
        self.rooms
            .with_records(|rooms| {
                let occupied = rooms
                    .iter()
                    .filter(|r| r.status == RoomStatus::Occupied)
                    .count();
                RoomSummary {
                    total: rooms.len(),
                    available: rooms.len() - occupied,
                    occupied,
                }
            })
            .await
    }

    pub async fn available(&self) -> Vec<Room> {
        self.rooms
            .with_records(|rooms| {
                rooms
                    .iter()
                    .filter(|r| r.status == RoomStatus::Available)
                    .cloned()
                    .collect()
            })
            .await
    }
}

fn validate_draft(draft: RoomDraft) -> Result<RoomDraft> {
    let number = draft.number.trim();
    if number.is_empty() {
        return Err(KosError::validation("Nomor kamar wajib diisi"));
    }
    if draft.monthly_price <= 0 {
        return Err(KosError::validation("Harga per bulan harus lebih dari 0"));
    }
    Ok(RoomDraft {
        number: number.to_string(),
        ..draft
    })
}
