//! Admin decisions on move-in issues
//!
//! Recording the decision is the only step the call succeeds or fails on. The audit
//! entry and the approval side effects (lease cancellation, property hold, refund and
//! hold notifications) each run on their own; a failure is logged and the rest proceed.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::issue::{AdminDecision, AdminDecisionRequest, AdminDecisionUpdate, AuditLog, MoveInIssue};
use crate::lease::{Lease, LeaseProvisioner, LeaseStatus, Offer, Property, PropertyStatus};
use crate::notification::{NotificationTemplate, NotificationType, Notifier};
use crate::store::MoveInStore;

pub const DEFAULT_PROPERTY_HOLD_DAYS: i64 = 30;

const AUDIT_RESOURCE_TYPE: &str = "MOVE_IN_ISSUE";

/// Rows around an issue, loaded best-effort after the decision is recorded
#[derive(Default)]
struct DecisionContext {
    lease: Option<Lease>,
    offer: Option<Offer>,
    property: Option<Property>,
    tenant_name: Option<String>,
    landlord_name: Option<String>,
}

pub struct DecisionService {
    store: Arc<dyn MoveInStore>,
    notifier: Notifier,
    leases: LeaseProvisioner,
    property_hold_days: i64,
}

impl DecisionService {
    pub fn new(
        store: Arc<dyn MoveInStore>,
        notifier: Notifier,
        leases: LeaseProvisioner,
        property_hold_days: i64,
    ) -> Self {
        Self {
            store,
            notifier,
            leases,
            property_hold_days,
        }
    }

    pub async fn apply_admin_decision(
        &self,
        issue_id: Uuid,
        admin_id: Uuid,
        request: AdminDecisionRequest,
    ) -> ApiResult<MoveInIssue> {
        let decision = AdminDecision::parse(&request.decision).ok_or_else(|| {
            ApiError::ValidationError(format!("Invalid decision '{}'", request.decision))
        })?;

        let issue = self
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Move-in issue not found".to_string()))?;
        if issue.is_decided() {
            return Err(ApiError::AlreadyDecided);
        }

        let now = Utc::now();
        let (refund_amount, property_hold_until) = if decision.is_approval() {
            let refund = request
                .refund_amount
                .filter(|amount| amount.is_finite() && *amount > 0.0)
                .ok_or_else(|| {
                    ApiError::ValidationError(
                        "Refund amount must be a positive number when approving".to_string(),
                    )
                })?;
            let hold_until = (now + Duration::days(self.property_hold_days)).date_naive();
            (Some(refund), Some(hold_until))
        } else {
            (None, None)
        };

        let notes = request
            .notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let update = AdminDecisionUpdate {
            decision,
            status: decision.resulting_status(),
            decided_at: now,
            decided_by: admin_id,
            notes,
            refund_amount,
            property_hold_until,
        };

        // Conditional on admin_decision IS NULL; a concurrent admin may have won
        let decided = self
            .store
            .record_admin_decision(issue.id, &update)
            .await?
            .ok_or(ApiError::AlreadyDecided)?;

        tracing::info!(
            issue_id = %decided.id,
            admin_id = %admin_id,
            decision = decision.as_str(),
            status = decided.status.as_str(),
            "Admin decision recorded"
        );

        let context = self.load_context(&decided).await;
        self.write_audit_log(&decided, admin_id, decision, &context, now)
            .await;

        if decision.is_approval() {
            self.apply_approval_actions(&decided, &context).await;
        }

        self.announce(&decided, &context).await;

        Ok(decided)
    }

    async fn load_context(&self, issue: &MoveInIssue) -> DecisionContext {
        let mut context = DecisionContext::default();

        context.lease = match self.store.get_lease(issue.lease_id).await {
            Ok(lease) => lease,
            Err(e) => {
                tracing::error!(issue_id = %issue.id, "Failed to load lease for decision: {}", e);
                None
            }
        };
        let Some(lease) = context.lease.as_ref() else {
            return context;
        };

        context.offer = self
            .store
            .get_offer(lease.offer_id)
            .await
            .map_err(|e| tracing::error!(lease_id = %lease.id, "Failed to load offer: {}", e))
            .ok()
            .flatten();
        context.property = self
            .store
            .get_property(lease.property_id)
            .await
            .map_err(|e| tracing::error!(lease_id = %lease.id, "Failed to load property: {}", e))
            .ok()
            .flatten();

        if let Some(offer) = context.offer.as_ref() {
            context.tenant_name = self.name_of(offer.tenant_id).await;
            context.landlord_name = self.name_of(offer.landlord_id).await;
        }

        context
    }

    async fn name_of(&self, user_id: Uuid) -> Option<String> {
        match self.store.display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id = %user_id, "Failed to load display name: {}", e);
                None
            }
        }
    }

    async fn write_audit_log(
        &self,
        issue: &MoveInIssue,
        admin_id: Uuid,
        decision: AdminDecision,
        context: &DecisionContext,
        decided_at: DateTime<Utc>,
    ) {
        let entry = AuditLog {
            id: Uuid::new_v4(),
            admin_id,
            action: decision.audit_action(),
            resource_type: AUDIT_RESOURCE_TYPE.to_string(),
            resource_id: issue.id,
            details: json!({
                "decision": decision.as_str(),
                "notes": issue.admin_notes,
                "issueTitle": issue.title,
                "leaseId": issue.lease_id,
                "propertyId": context.property.as_ref().map(|p| p.id),
                "tenantName": context.tenant_name,
                "landlordName": context.landlord_name,
                "status": issue.status.as_str(),
                "refundAmount": issue.refund_amount,
                "propertyHoldUntil": issue.property_hold_until,
                "decidedAt": decided_at.to_rfc3339(),
            }),
            created_at: decided_at,
        };

        if let Err(e) = self.store.insert_audit_log(entry).await {
            tracing::error!(
                issue_id = %issue.id,
                admin_id = %admin_id,
                "Failed to write audit log for admin decision: {}",
                e
            );
        }
    }

    async fn apply_approval_actions(&self, issue: &MoveInIssue, context: &DecisionContext) {
        match context.lease.as_ref() {
            Some(lease) => match self.store.set_lease_status(lease.id, LeaseStatus::Cancelled).await {
                Ok(true) => tracing::info!(lease_id = %lease.id, "Lease cancelled after approved move-in issue"),
                Ok(false) => tracing::warn!(lease_id = %lease.id, "Lease not found while cancelling"),
                Err(e) => tracing::error!(lease_id = %lease.id, "Failed to cancel lease: {}", e),
            },
            None => tracing::error!(issue_id = %issue.id, "No lease to cancel for approved issue"),
        }

        match context.property.as_ref() {
            Some(property) => match self.store.set_property_status(property.id, PropertyStatus::Hold).await {
                Ok(true) => tracing::info!(property_id = %property.id, "Property placed on hold"),
                Ok(false) => tracing::warn!(property_id = %property.id, "Property not found while placing hold"),
                Err(e) => tracing::error!(property_id = %property.id, "Failed to place property on hold: {}", e),
            },
            None => tracing::error!(issue_id = %issue.id, "No property to hold for approved issue"),
        }

        let refund = issue.refund_amount.unwrap_or_default();
        if let Some(offer) = context.offer.as_ref() {
            let template = NotificationTemplate::new(
                NotificationType::RefundPending,
                issue.id,
                "Refund pending",
                format!(
                    "Your move-in issue was approved. A refund of {:.2} is being processed.",
                    refund
                ),
            );
            self.notifier.notify(&[offer.tenant_id], &template).await;
        } else {
            tracing::error!(issue_id = %issue.id, "No offer found, refund notification not sent");
        }

        if let Some(property) = context.property.as_ref() {
            let owners = match self.store.organization_owners(property.organization_id).await {
                Ok(owners) => owners,
                Err(e) => {
                    tracing::error!(property_id = %property.id, "Failed to load owners: {}", e);
                    Vec::new()
                }
            };
            let until = issue
                .property_hold_until
                .map(|d| d.to_string())
                .unwrap_or_default();
            let template = NotificationTemplate::new(
                NotificationType::PropertyHold,
                property.id,
                "Property placed on hold",
                format!(
                    "\"{}\" is on hold until {} following an approved move-in issue.",
                    property.title, until
                ),
            );
            self.notifier.notify(&owners, &template).await;
        }
    }

    async fn announce(&self, issue: &MoveInIssue, context: &DecisionContext) {
        let Some(lease) = context.lease.as_ref() else {
            return;
        };
        let participants = match self.leases.participants_for_lease(lease).await {
            Ok(participants) => participants,
            Err(e) => {
                tracing::error!(issue_id = %issue.id, "Failed to resolve participants: {}", e);
                return;
            }
        };

        let decision = issue
            .admin_decision
            .map(|d| d.as_str())
            .unwrap_or_default();
        let body = match issue.admin_notes.as_deref() {
            Some(notes) => format!("Decision on \"{}\": {}. Notes: {}", issue.title, decision, notes),
            None => format!("Decision on \"{}\": {}", issue.title, decision),
        };
        let template = NotificationTemplate::new(
            NotificationType::MoveInAdminDecision,
            issue.id,
            "Admin decision on move-in issue",
            body,
        );
        self.notifier.notify(&participants.all(), &template).await;
    }
}
