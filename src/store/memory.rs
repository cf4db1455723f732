//! In-process implementation of the persistence gateway
//!
//! Backs local runs with `STORE_BACKEND=memory` and the integration tests. All state
//! sits behind one async mutex, so every trait method is trivially atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{MoveInStore, StoreError, StoreResult};
use crate::issue::{AdminDecisionUpdate, AuditLog, IssueStatus, MoveInIssue, MoveInIssueComment, StatusTransition};
use crate::lease::{Lease, LeaseStatus, MoveInVerificationStatus, Offer, Property, PropertyStatus, Unit};
use crate::notification::Notification;

/// Store operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    SetLeaseStatus,
    SetPropertyStatus,
    InsertLease,
    InsertIssue,
    InsertAuditLog,
    InsertNotification,
}

#[derive(Default)]
struct State {
    offers: HashMap<Uuid, Offer>,
    properties: HashMap<Uuid, Property>,
    units: Vec<Unit>,
    leases: Vec<Lease>,
    issues: Vec<MoveInIssue>,
    comments: Vec<MoveInIssueComment>,
    notifications: Vec<Notification>,
    audit_logs: Vec<AuditLog>,
    tenant_groups: HashMap<Uuid, Vec<Uuid>>,
    organizations: HashMap<Uuid, Vec<Uuid>>,
    display_names: HashMap<Uuid, String>,
    failing: HashSet<FailPoint>,
}

impl State {
    fn check(&self, point: FailPoint) -> StoreResult<()> {
        if self.failing.contains(&point) {
            return Err(StoreError::Backend(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    fn issue_mut(&mut self, issue_id: Uuid) -> Option<&mut MoveInIssue> {
        self.issues.iter_mut().find(|issue| issue.id == issue_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Seeding =====

    pub async fn insert_offer(&self, offer: Offer) {
        self.state.lock().await.offers.insert(offer.id, offer);
    }

    pub async fn insert_property(&self, property: Property) {
        self.state.lock().await.properties.insert(property.id, property);
    }

    pub async fn insert_unit(&self, unit: Unit) {
        self.state.lock().await.units.push(unit);
    }

    pub async fn add_tenant_group_member(&self, tenant_group_id: Uuid, user_id: Uuid) {
        self.state
            .lock()
            .await
            .tenant_groups
            .entry(tenant_group_id)
            .or_default()
            .push(user_id);
    }

    pub async fn add_organization_owner(&self, organization_id: Uuid, user_id: Uuid) {
        self.state
            .lock()
            .await
            .organizations
            .entry(organization_id)
            .or_default()
            .push(user_id);
    }

    pub async fn set_display_name(&self, user_id: Uuid, name: impl Into<String>) {
        self.state.lock().await.display_names.insert(user_id, name.into());
    }

    pub async fn set_failing(&self, point: FailPoint, failing: bool) {
        let mut state = self.state.lock().await;
        if failing {
            state.failing.insert(point);
        } else {
            state.failing.remove(&point);
        }
    }

    // ===== Inspection =====

    pub async fn issues(&self) -> Vec<MoveInIssue> {
        self.state.lock().await.issues.clone()
    }

    pub async fn leases(&self) -> Vec<Lease> {
        self.state.lock().await.leases.clone()
    }

    pub async fn units(&self) -> Vec<Unit> {
        self.state.lock().await.units.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.lock().await.notifications.clone()
    }

    pub async fn audit_logs(&self) -> Vec<AuditLog> {
        self.state.lock().await.audit_logs.clone()
    }
}

#[async_trait]
impl MoveInStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_offer(&self, offer_id: Uuid) -> StoreResult<Option<Offer>> {
        Ok(self.state.lock().await.offers.get(&offer_id).cloned())
    }

    async fn list_pending_verifications(&self) -> StoreResult<Vec<Offer>> {
        let state = self.state.lock().await;
        let mut offers: Vec<Offer> = state
            .offers
            .values()
            .filter(|offer| {
                offer.is_pending_verification() && offer.move_in_verification_deadline.is_some()
            })
            .cloned()
            .collect();
        offers.sort_by_key(|offer| offer.move_in_verification_deadline);
        Ok(offers)
    }

    async fn start_verification(&self, offer_id: Uuid, deadline: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.offers.get_mut(&offer_id) {
            Some(offer)
                if matches!(
                    offer.move_in_verification_status,
                    None | Some(MoveInVerificationStatus::Pending)
                ) =>
            {
                offer.move_in_verification_status = Some(MoveInVerificationStatus::Pending);
                offer.move_in_verification_deadline = Some(deadline);
                offer.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_verification(&self, offer_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.offers.get_mut(&offer_id) {
            Some(offer) if offer.is_pending_verification() => {
                offer.move_in_verification_status = Some(MoveInVerificationStatus::Success);
                offer.move_in_verification_date = Some(now);
                offer.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_issue_reported(&self, offer_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.offers.get_mut(&offer_id) {
            Some(offer) if offer.is_pending_verification() => {
                offer.move_in_verification_status = Some(MoveInVerificationStatus::IssueReported);
                offer.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_issue_report(&self, offer_id: Uuid) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        let lease_ids: HashSet<Uuid> = state
            .leases
            .iter()
            .filter(|lease| lease.offer_id == offer_id)
            .map(|lease| lease.id)
            .collect();
        if state.issues.iter().any(|issue| lease_ids.contains(&issue.lease_id)) {
            return Ok(false);
        }

        match state.offers.get_mut(&offer_id) {
            Some(offer)
                if offer.move_in_verification_status
                    == Some(MoveInVerificationStatus::IssueReported) =>
            {
                offer.move_in_verification_status = Some(MoveInVerificationStatus::Pending);
                offer.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn tenant_group_members(&self, tenant_group_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        Ok(state.tenant_groups.get(&tenant_group_id).cloned().unwrap_or_default())
    }

    async fn organization_owners(&self, organization_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        Ok(state.organizations.get(&organization_id).cloned().unwrap_or_default())
    }

    async fn display_name(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        Ok(self.state.lock().await.display_names.get(&user_id).cloned())
    }

    async fn get_property(&self, property_id: Uuid) -> StoreResult<Option<Property>> {
        Ok(self.state.lock().await.properties.get(&property_id).cloned())
    }

    async fn set_property_status(&self, property_id: Uuid, status: PropertyStatus) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::SetPropertyStatus)?;
        match state.properties.get_mut(&property_id) {
            Some(property) => {
                property.status = status;
                property.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ensure_default_unit(&self, property_id: Uuid) -> StoreResult<Unit> {
        let mut state = self.state.lock().await;
        if let Some(unit) = state.units.iter().find(|unit| unit.property_id == property_id) {
            return Ok(unit.clone());
        }

        let unit = Unit {
            id: Uuid::new_v4(),
            property_id,
            label: "Main unit".to_string(),
            created_at: Utc::now(),
        };
        state.units.push(unit.clone());
        Ok(unit)
    }

    async fn find_lease_for_offer(&self, offer_id: Uuid) -> StoreResult<Option<Lease>> {
        let state = self.state.lock().await;
        Ok(state
            .leases
            .iter()
            .find(|lease| lease.offer_id == offer_id && lease.status.is_open())
            .cloned())
    }

    async fn insert_lease_if_absent(&self, lease: Lease) -> StoreResult<Lease> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertLease)?;
        if let Some(existing) = state
            .leases
            .iter()
            .find(|existing| existing.offer_id == lease.offer_id && existing.status.is_open())
        {
            return Ok(existing.clone());
        }

        state.leases.push(lease.clone());
        Ok(lease)
    }

    async fn get_lease(&self, lease_id: Uuid) -> StoreResult<Option<Lease>> {
        let state = self.state.lock().await;
        Ok(state.leases.iter().find(|lease| lease.id == lease_id).cloned())
    }

    async fn set_lease_status(&self, lease_id: Uuid, status: LeaseStatus) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::SetLeaseStatus)?;
        match state.leases.iter_mut().find(|lease| lease.id == lease_id) {
            Some(lease) => {
                lease.status = status;
                lease.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_issue_if_no_active(&self, issue: MoveInIssue) -> StoreResult<(MoveInIssue, bool)> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertIssue)?;
        if let Some(existing) = state
            .issues
            .iter()
            .find(|existing| existing.lease_id == issue.lease_id && existing.status.is_active())
        {
            return Ok((existing.clone(), false));
        }

        state.issues.push(issue.clone());
        Ok((issue, true))
    }

    async fn get_issue(&self, issue_id: Uuid) -> StoreResult<Option<MoveInIssue>> {
        let state = self.state.lock().await;
        Ok(state.issues.iter().find(|issue| issue.id == issue_id).cloned())
    }

    async fn touch_issue(&self, issue_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let issue = state
            .issue_mut(issue_id)
            .ok_or_else(|| StoreError::NotFound("Issue not found".to_string()))?;
        issue.updated_at = now;
        Ok(())
    }

    async fn transition_issue(
        &self,
        issue_id: Uuid,
        from: IssueStatus,
        transition: &StatusTransition,
    ) -> StoreResult<Option<MoveInIssue>> {
        let mut state = self.state.lock().await;
        match state.issue_mut(issue_id) {
            Some(issue)
                if issue.status == from
                    && issue.status.is_active()
                    && issue.admin_decision.is_none() =>
            {
                issue.status = transition.to;
                issue.updated_at = transition.at;
                if let Some(resolver) = transition.resolved_by {
                    issue.resolved_at = Some(transition.at);
                    issue.resolved_by_user_id = Some(resolver);
                }
                Ok(Some(issue.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_admin_decision(
        &self,
        issue_id: Uuid,
        update: &AdminDecisionUpdate,
    ) -> StoreResult<Option<MoveInIssue>> {
        let mut state = self.state.lock().await;
        match state.issue_mut(issue_id) {
            Some(issue) if issue.admin_decision.is_none() => {
                issue.admin_decision = Some(update.decision);
                issue.status = update.status;
                issue.admin_decision_at = Some(update.decided_at);
                issue.admin_decision_by = Some(update.decided_by);
                issue.admin_notes = update.notes.clone();
                issue.refund_amount = update.refund_amount;
                issue.property_hold_until = update.property_hold_until;
                issue.updated_at = update.decided_at;
                Ok(Some(issue.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list_issues(
        &self,
        statuses: &[IssueStatus],
        page: i64,
        limit: i64,
    ) -> StoreResult<(Vec<MoveInIssue>, i64)> {
        let state = self.state.lock().await;
        let mut matching: Vec<MoveInIssue> = state
            .issues
            .iter()
            .filter(|issue| statuses.contains(&issue.status))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as i64;
        let offset = (page - 1).max(0).saturating_mul(limit.max(0)) as usize;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit.max(0) as usize)
            .collect();

        Ok((items, total))
    }

    async fn insert_comment(&self, comment: MoveInIssueComment) -> StoreResult<MoveInIssueComment> {
        self.state.lock().await.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, issue_id: Uuid) -> StoreResult<Vec<MoveInIssueComment>> {
        let state = self.state.lock().await;
        let mut comments: Vec<MoveInIssueComment> = state
            .comments
            .iter()
            .filter(|comment| comment.issue_id == issue_id)
            .cloned()
            .collect();
        comments.sort_by_key(|comment| comment.created_at);
        Ok(comments)
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertNotification)?;
        state.notifications.push(notification);
        Ok(())
    }

    async fn notification_exists(&self, user_id: Uuid, entity_id: Uuid, title: &str) -> StoreResult<bool> {
        let state = self.state.lock().await;
        Ok(state.notifications.iter().any(|n| {
            n.user_id == user_id && n.entity_id == entity_id && n.title == title
        }))
    }

    async fn list_notifications_for(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let state = self.state.lock().await;
        let mut notifications: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn insert_audit_log(&self, entry: AuditLog) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check(FailPoint::InsertAuditLog)?;
        state.audit_logs.push(entry);
        Ok(())
    }

    async fn list_audit_logs(&self, resource_id: Uuid) -> StoreResult<Vec<AuditLog>> {
        let state = self.state.lock().await;
        Ok(state
            .audit_logs
            .iter()
            .filter(|entry| entry.resource_id == resource_id)
            .cloned()
            .collect())
    }
}
