//! Notification sink

use futures_util::future::join_all;
use std::sync::Arc;
use uuid::Uuid;

use crate::notification::NotificationTemplate;
use crate::store::{MoveInStore, StoreResult};

/// Writes notifications on behalf of the core.
///
/// Fan-out never fails the caller: individual write errors are logged and skipped.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn MoveInStore>,
}

impl Notifier {
    pub fn new(store: Arc<dyn MoveInStore>) -> Self {
        Self { store }
    }

    /// Send one template to many recipients, returning how many were written
    pub async fn notify(&self, recipients: &[Uuid], template: &NotificationTemplate) -> usize {
        let writes = recipients.iter().map(|user_id| {
            let notification = template.for_user(*user_id);
            let store = self.store.clone();
            async move {
                let user_id = notification.user_id;
                (user_id, store.insert_notification(notification).await)
            }
        });

        let mut delivered = 0;
        for (user_id, result) in join_all(writes).await {
            match result {
                Ok(()) => delivered += 1,
                Err(e) => tracing::error!(
                    user_id = %user_id,
                    entity_id = %template.entity_id,
                    title = %template.title,
                    "Failed to create notification: {}",
                    e
                ),
            }
        }

        delivered
    }

    /// Send unless the user already has a notification with the same entity and title.
    ///
    /// Returns whether a new notification was written.
    pub async fn notify_once(&self, user_id: Uuid, template: &NotificationTemplate) -> StoreResult<bool> {
        if self
            .store
            .notification_exists(user_id, template.entity_id, &template.title)
            .await?
        {
            return Ok(false);
        }

        self.store.insert_notification(template.for_user(user_id)).await?;
        Ok(true)
    }
}
