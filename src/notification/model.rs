//! Notification models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    MoveInReminder,
    MoveInAutoConfirmed,
    MoveInIssueReported,
    MoveInIssueComment,
    MoveInIssueStatusChanged,
    MoveInAdminReviewRequested,
    MoveInAdminDecision,
    RefundPending,
    PropertyHold,
}

/// Stored notification; delivery and read tracking live elsewhere
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub entity_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Recipient-independent part of a notification
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationTemplate {
    pub notification_type: NotificationType,
    pub entity_id: Uuid,
    pub title: String,
    pub body: String,
}

impl NotificationTemplate {
    pub fn new(
        notification_type: NotificationType,
        entity_id: Uuid,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            entity_id,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn for_user(&self, user_id: Uuid) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            user_id,
            notification_type: self.notification_type,
            entity_id: self.entity_id,
            title: self.title.clone(),
            body: self.body.clone(),
            created_at: Utc::now(),
        }
    }
}
