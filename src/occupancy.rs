// occupancy.rs
// Room occupancy follows tenant assignment.
//
// A room is occupied exactly while one tenant holds it. Every tenant mutation
// describes its effect as a [`RoomChange`] and hands it to the configured
// [`RoomOccupancyCoordinator`]; nothing else flips room status.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::gateway::RoomGateway;
use crate::models::{Id, RoomStatus};

/// Room held by a tenant before and after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoomChange {
    pub previous: Option<Id>,
    pub next: Option<Id>,
}

impl RoomChange {
    pub fn assign(room: Option<Id>) -> Self {
        RoomChange {
            previous: None,
            next: room,
        }
    }

    pub fn release(room: Option<Id>) -> Self {
        RoomChange {
            previous: room,
            next: None,
        }
    }

    pub fn moved(previous: Option<Id>, next: Option<Id>) -> Self {
        RoomChange { previous, next }
    }

    /// Status updates implied by the change, releases first.
    pub fn transitions(&self) -> Vec<(Id, RoomStatus)> {
        if self.previous == self.next {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(2);
        if let Some(previous) = self.previous {
            out.push((previous, RoomStatus::Available));
        }
        if let Some(next) = self.next {
            out.push((next, RoomStatus::Occupied));
        }
        out
    }
}

#[async_trait]
pub trait RoomOccupancyCoordinator: Send + Sync {
    async fn mark(&self, room_id: Id, status: RoomStatus) -> Result<()>;

    async fn reconcile(&self, change: RoomChange) -> Result<()> {
        for (room_id, status) in change.transitions() {
            self.mark(room_id, status).await?;
            tracing::info!(room_id, status = status.as_str(), "room occupancy updated");
        }
        Ok(())
    }
}

/// The backend already maintains room status when tenants change.
pub struct BackendManaged;

#[async_trait]
impl RoomOccupancyCoordinator for BackendManaged {
    async fn mark(&self, _room_id: Id, _status: RoomStatus) -> Result<()> {
        Ok(())
    }

    async fn reconcile(&self, _change: RoomChange) -> Result<()> {
        Ok(())
    }
}

/// Pushes room status updates through the room gateway.
pub struct GatewayOccupancy {
    rooms: Arc<dyn RoomGateway>,
}

impl GatewayOccupancy {
    pub fn new(rooms: Arc<dyn RoomGateway>) -> Self {
        GatewayOccupancy { rooms }
    }
}

#[async_trait]
impl RoomOccupancyCoordinator for GatewayOccupancy {
    async fn mark(&self, room_id: Id, status: RoomStatus) -> Result<()> {
        self.rooms.update_room_status(room_id, status).await.map(|_| ())
    }
}
