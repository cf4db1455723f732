//! Move-in verification service - reminder and auto-finalization passes

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::lease::Offer;
use crate::notification::{NotificationTemplate, NotificationType, Notifier};
use crate::store::MoveInStore;
use crate::verification::deadline::{
    compute_verification_deadline, is_within_reminder_window, reminder_title,
    REMINDER_THRESHOLDS_HOURS,
};

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub reminders_sent: usize,
    pub finalized: Vec<Uuid>,
    /// Offers whose finalization lost the race to another actor
    pub skipped: usize,
}

pub struct VerificationService {
    store: Arc<dyn MoveInStore>,
    notifier: Notifier,
    reminder_window_minutes: i64,
}

impl VerificationService {
    pub fn new(store: Arc<dyn MoveInStore>, notifier: Notifier, reminder_window_minutes: i64) -> Self {
        Self {
            store,
            notifier,
            reminder_window_minutes,
        }
    }

    /// Put an accepted offer into PENDING verification with its computed deadline
    pub async fn begin_verification(&self, offer_id: Uuid) -> ApiResult<DateTime<Utc>> {
        let offer = self
            .store
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Offer not found".to_string()))?;

        let deadline = compute_verification_deadline(offer.lease_start_date)?;

        if !self.store.start_verification(offer_id, deadline).await? {
            return Err(ApiError::InvalidState(
                "Move-in verification already completed for this offer".to_string(),
            ));
        }

        tracing::info!(offer_id = %offer_id, deadline = %deadline, "Move-in verification started");
        Ok(deadline)
    }

    pub async fn run_tick(&self) -> Result<TickSummary> {
        self.run_tick_at(Utc::now()).await
    }

    /// Both passes against a fixed clock; the reminder pass runs first
    pub async fn run_tick_at(&self, now: DateTime<Utc>) -> Result<TickSummary> {
        let reminders_sent = self.send_reminders_at(now).await?;
        let (finalized, skipped) = self.finalize_expired_at(now).await?;

        Ok(TickSummary {
            reminders_sent,
            finalized,
            skipped,
        })
    }

    /// Send due reminders for every pending offer, returning how many were written
    pub async fn send_reminders_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let pending = self
            .store
            .list_pending_verifications()
            .await
            .context("Failed to load pending verifications")?;

        let mut sent = 0;
        for offer in pending {
            match self.remind_offer(offer.id, now).await {
                Ok(count) => sent += count,
                Err(e) => tracing::error!(offer_id = %offer.id, "Reminder failed: {:#}", e),
            }
        }

        Ok(sent)
    }

    async fn remind_offer(&self, offer_id: Uuid, now: DateTime<Utc>) -> Result<usize> {
        // Re-read right before acting: an issue report or confirmation may have landed
        let offer = match self.store.get_offer(offer_id).await? {
            Some(offer) if offer.is_pending_verification() => offer,
            _ => return Ok(0),
        };
        let deadline = match offer.move_in_verification_deadline {
            Some(deadline) if deadline > now => deadline,
            // Finalization owns expired offers
            _ => return Ok(0),
        };

        let mut sent = 0;
        for hours in REMINDER_THRESHOLDS_HOURS {
            if !is_within_reminder_window(deadline, now, hours, self.reminder_window_minutes) {
                continue;
            }

            if self
                .notifier
                .notify_once(offer.tenant_id, &tenant_reminder(&offer, hours))
                .await?
            {
                sent += 1;
                tracing::info!(offer_id = %offer.id, hours, "Move-in reminder sent");
            }

            if hours == 1
                && self
                    .notifier
                    .notify_once(offer.landlord_id, &landlord_last_hour(&offer))
                    .await?
            {
                sent += 1;
            }
        }

        Ok(sent)
    }

    /// Auto-confirm every pending offer whose deadline has passed.
    ///
    /// Returns the finalized offer ids and the number skipped because their status
    /// changed between the read and the conditional update.
    pub async fn finalize_expired_at(&self, now: DateTime<Utc>) -> Result<(Vec<Uuid>, usize)> {
        let expired: Vec<Offer> = self
            .store
            .list_pending_verifications()
            .await
            .context("Failed to load pending verifications")?
            .into_iter()
            .filter(|offer| matches!(offer.move_in_verification_deadline, Some(d) if d <= now))
            .collect();

        let mut finalized = Vec::new();
        let mut skipped = 0;

        for offer in expired {
            match self.store.finalize_verification(offer.id, now).await {
                Ok(true) => {
                    let tenant = NotificationTemplate::new(
                        NotificationType::MoveInAutoConfirmed,
                        offer.id,
                        "Move-in automatically confirmed",
                        "The verification period ended without a reported issue, so your move-in has been confirmed.",
                    );
                    let landlord = NotificationTemplate::new(
                        NotificationType::MoveInAutoConfirmed,
                        offer.id,
                        "Tenant move-in auto-confirmed",
                        "The tenant did not report any issue within 24 hours. The move-in is now confirmed.",
                    );
                    self.notifier.notify(&[offer.tenant_id], &tenant).await;
                    self.notifier.notify(&[offer.landlord_id], &landlord).await;

                    tracing::info!(offer_id = %offer.id, "Move-in verification auto-finalized");
                    finalized.push(offer.id);
                }
                Ok(false) => {
                    tracing::debug!(
                        offer_id = %offer.id,
                        "Offer left PENDING before finalization, skipping"
                    );
                    skipped += 1;
                }
                Err(e) => tracing::error!(offer_id = %offer.id, "Finalization failed: {}", e),
            }
        }

        Ok((finalized, skipped))
    }
}

fn tenant_reminder(offer: &Offer, hours: i64) -> NotificationTemplate {
    let body = if hours == 1 {
        "You have 1 hour left to confirm your move-in or report an issue.".to_string()
    } else {
        format!(
            "You have {} hours left to confirm your move-in or report an issue.",
            hours
        )
    };

    NotificationTemplate::new(
        NotificationType::MoveInReminder,
        offer.id,
        reminder_title(hours),
        body,
    )
}

fn landlord_last_hour(offer: &Offer) -> NotificationTemplate {
    NotificationTemplate::new(
        NotificationType::MoveInReminder,
        offer.id,
        "Tenant has 1 hour left to verify move-in",
        "The move-in will be confirmed automatically if the tenant does not report an issue within the hour.",
    )
}
