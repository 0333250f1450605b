// state/face.rs
// Door camera data kept for the admin screens.

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{KosError, Result};
use crate::gateway::{FaceGateway, LogFilter};
use crate::models::{AccessLog, FaceNotification, FaceStats, Id, Recognition};

use super::cache::{Collection, Snapshot};

/// Door camera data: access logs, notifications and their unread badge.
pub struct FaceStore {
    gateway: Arc<dyn FaceGateway>,
    logs: Collection<AccessLog>,
    notifications: Collection<FaceNotification>,
    unread: RwLock<u64>,
    stats: RwLock<Option<FaceStats>>,
}

impl FaceStore {
    pub fn new(gateway: Arc<dyn FaceGateway>) -> Self {
        FaceStore {
            gateway,
            logs: Collection::new(),
            notifications: Collection::new(),
            unread: RwLock::new(0),
            stats: RwLock::new(None),
        }
    }

    pub async fn fetch_logs(&self, filter: LogFilter) -> Result<()> {
        self.logs
            .sync("access_logs", self.gateway.list_logs(&filter))
            .await
    }

    pub async fn logs(&self) -> Snapshot<AccessLog> {
        self.logs.snapshot().await
    }

    pub async fn fetch_notifications(&self) -> Result<()> {
        self.notifications
            .sync("notifications", self.gateway.list_notifications())
            .await
    }

    pub async fn notifications(&self) -> Snapshot<FaceNotification> {
        self.notifications.snapshot().await
    }

    pub async fn unread_count(&self) -> u64 {
        *self.unread.read().await
    }

    pub async fn refresh_unread_count(&self) -> Result<u64> {
        let count = self.gateway.unread_count().await?;
        *self.unread.write().await = count;
        Ok(count)
    }

    /// Marks one notification read and patches the local copy without refetching.
    pub async fn mark_read(&self, id: Id) -> Result<()> {
        self.notifications
            .mutate("notifications", self.gateway.mark_notification_read(id))
            .await?;
        let mut was_unread = false;
        self.notifications
            .patch(id, |n| {
                was_unread = !n.read;
                n.read = true;
            })
            .await;
        if was_unread {
            let mut unread = self.unread.write().await;
            *unread = unread.saturating_sub(1);
        }
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<()> {
        self.notifications
            .mutate("notifications", self.gateway.mark_all_notifications_read())
            .await?;
        self.notifications.patch_all(|n| n.read = true).await;
        *self.unread.write().await = 0;
        Ok(())
    }

    pub async fn fetch_stats(&self) -> Result<FaceStats> {
        let stats = self.gateway.face_stats().await?;
        *self.stats.write().await = Some(stats.clone());
        Ok(stats)
    }

    pub async fn stats(&self) -> Option<FaceStats> {
        self.stats.read().await.clone()
    }

    /// Registers a face photo for a tenant. Subject to the longer upload timeout.
    pub async fn upload_face(&self, tenant_id: Id, photo: Vec<u8>, filename: &str) -> Result<()> {
        if photo.is_empty() {
            return Err(KosError::validation("Foto wajah wajib diunggah"));
        }
        let size = photo.len();
        self.gateway.upload_face(tenant_id, photo, filename).await?;
        tracing::info!(tenant_id, size, "face photo uploaded");
        Ok(())
    }

    pub async fn remove_face(&self, tenant_id: Id) -> Result<()> {
        self.gateway.remove_face(tenant_id).await?;
        tracing::info!(tenant_id, "face data removed");
        Ok(())
    }

    pub async fn recognize(&self, image: &str) -> Result<Vec<Recognition>> {
        self.gateway.recognize(image).await
    }

    /// Adds a notification delivered by the backend's push channel ahead of the
    /// fetched ones. A repeated delivery of the same id changes nothing.
    pub async fn push_notification(&self, notification: FaceNotification) -> bool {
        let unread = !notification.read;
        let id = notification.id;
        if !self.notifications.prepend(notification).await {
            return false;
        }
        if unread {
            *self.unread.write().await += 1;
        }
        tracing::info!(notification_id = id, "notification pushed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryBackend;
    use crate::models::{BoundingBox, FaceStatus};

    fn stranger() -> Recognition {
        Recognition {
            status: FaceStatus::Unknown,
            name: None,
            tenant_id: None,
            confidence: 0.0,
            location: BoundingBox::default(),
        }
    }

    #[tokio::test]
    async fn mark_read_only_decrements_unread_once() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.queue_recognition(vec![stranger(), stranger()]);
        let store = FaceStore::new(backend.clone());
        store.recognize("data:image/jpeg;base64,AA==").await.unwrap();
        store.fetch_notifications().await.unwrap();
        assert_eq!(store.refresh_unread_count().await.unwrap(), 2);

        let first = store.notifications().await.items[0].id;
        store.mark_read(first).await.unwrap();
        store.mark_read(first).await.unwrap();
        assert_eq!(store.unread_count().await, 1);

        store.mark_all_read().await.unwrap();
        assert_eq!(store.unread_count().await, 0);
        assert!(store.notifications().await.items.iter().all(|n| n.read));
        assert_eq!(backend.unread_count().await.unwrap(), 0);
    }

    fn pushed(id: Id) -> FaceNotification {
        FaceNotification {
            id,
            log_id: None,
            message: "Orang tidak dikenal terdeteksi!".into(),
            read: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn pushed_notification_goes_first_and_counts_once() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.queue_recognition(vec![stranger()]);
        let store = FaceStore::new(backend);
        store.recognize("data:image/jpeg;base64,AA==").await.unwrap();
        store.fetch_notifications().await.unwrap();
        store.refresh_unread_count().await.unwrap();

        assert!(store.push_notification(pushed(500)).await);
        assert!(!store.push_notification(pushed(500)).await);

        let items = store.notifications().await.items;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 500);
        assert_eq!(store.unread_count().await, 2);
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let store = FaceStore::new(Arc::new(InMemoryBackend::new()));
        let err = store.upload_face(1, Vec::new(), "foto.jpg").await.unwrap_err();
        assert!(matches!(err, KosError::Validation(_)));
    }
}
