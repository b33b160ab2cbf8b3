use crate::workflows::{ActionError, NewNotification, NotificationStore};
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

/// Writes workflow notifications to the shared `notifications` table.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, notification: NewNotification) -> Result<Uuid, ActionError> {
        let notification_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, title, message, notification_type,
                entity_type, entity_id, read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW())
            "#,
        )
        .bind(notification_id)
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.notification_type)
        .bind(&notification.entity_type)
        .bind(notification.entity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create notification '{}': {}", notification.title, e);
            ActionError::collaborator("notifications", e)
        })?;

        debug!("Created notification {}", notification_id);
        Ok(notification_id)
    }
}

/// Process-local notification store for the memory backend and tests.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<Vec<(Uuid, NewNotification)>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<(Uuid, NewNotification)> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, notification: NewNotification) -> Result<Uuid, ActionError> {
        let notification_id = Uuid::new_v4();
        self.notifications.write().await.push((notification_id, notification));
        Ok(notification_id)
    }
}
