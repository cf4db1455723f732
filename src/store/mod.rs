//! Persistence gateway
//!
//! `MoveInStore` is everything the move-in core needs from the database. The
//! conditional methods (`finalize_verification`, `mark_issue_reported`,
//! `release_issue_report`, `transition_issue`, `record_admin_decision`, the
//! `*_if_absent`/`*_if_no_active` inserts) are atomic compare-and-swap primitives:
//! callers inspect the returned flag or `Option` instead of holding locks.

mod memory;
mod postgres;

pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::issue::{AdminDecisionUpdate, AuditLog, IssueStatus, MoveInIssue, MoveInIssueComment, StatusTransition};
use crate::lease::{Lease, LeaseStatus, Offer, Property, PropertyStatus, Unit};
use crate::notification::Notification;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MoveInStore: Send + Sync {
    /// Connectivity check for health endpoints
    async fn ping(&self) -> StoreResult<()>;

    // ===== Offers =====

    async fn get_offer(&self, offer_id: Uuid) -> StoreResult<Option<Offer>>;

    /// Offers with status PENDING and a deadline set
    async fn list_pending_verifications(&self) -> StoreResult<Vec<Offer>>;

    /// Put an offer into PENDING with the given deadline, unless it already left PENDING
    async fn start_verification(&self, offer_id: Uuid, deadline: DateTime<Utc>) -> StoreResult<bool>;

    /// PENDING -> SUCCESS, stamping the verification date. False if the offer was no longer PENDING.
    async fn finalize_verification(&self, offer_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

    /// PENDING -> ISSUE_REPORTED. False if the offer was no longer PENDING.
    async fn mark_issue_reported(&self, offer_id: Uuid) -> StoreResult<bool>;

    /// ISSUE_REPORTED -> PENDING, only while no issue exists on any lease of the offer
    async fn release_issue_report(&self, offer_id: Uuid) -> StoreResult<bool>;

    // ===== Membership =====

    async fn tenant_group_members(&self, tenant_group_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn organization_owners(&self, organization_id: Uuid) -> StoreResult<Vec<Uuid>>;

    async fn display_name(&self, user_id: Uuid) -> StoreResult<Option<String>>;

    // ===== Properties, units and leases =====

    async fn get_property(&self, property_id: Uuid) -> StoreResult<Option<Property>>;

    async fn set_property_status(&self, property_id: Uuid, status: PropertyStatus) -> StoreResult<bool>;

    /// First unit of the property, creating a default one if it has none
    async fn ensure_default_unit(&self, property_id: Uuid) -> StoreResult<Unit>;

    /// The open (PENDING/ACTIVE) lease of an offer
    async fn find_lease_for_offer(&self, offer_id: Uuid) -> StoreResult<Option<Lease>>;

    /// Insert the lease unless the offer already has an open one, returning whichever row won
    async fn insert_lease_if_absent(&self, lease: Lease) -> StoreResult<Lease>;

    async fn get_lease(&self, lease_id: Uuid) -> StoreResult<Option<Lease>>;

    async fn set_lease_status(&self, lease_id: Uuid, status: LeaseStatus) -> StoreResult<bool>;

    // ===== Issues =====

    /// Insert the issue unless its lease already has an OPEN/IN_PROGRESS one.
    /// Returns the stored issue and whether it was newly created.
    async fn insert_issue_if_no_active(&self, issue: MoveInIssue) -> StoreResult<(MoveInIssue, bool)>;

    async fn get_issue(&self, issue_id: Uuid) -> StoreResult<Option<MoveInIssue>>;

    /// Bump updated_at
    async fn touch_issue(&self, issue_id: Uuid, now: DateTime<Utc>) -> StoreResult<()>;

    /// Apply the transition only if the issue is still in `from`, OPEN/IN_PROGRESS and undecided
    async fn transition_issue(
        &self,
        issue_id: Uuid,
        from: IssueStatus,
        transition: &StatusTransition,
    ) -> StoreResult<Option<MoveInIssue>>;

    /// Record the decision only if the issue has none yet
    async fn record_admin_decision(
        &self,
        issue_id: Uuid,
        update: &AdminDecisionUpdate,
    ) -> StoreResult<Option<MoveInIssue>>;

    /// Issues in any of the statuses, newest first, with the total match count
    async fn list_issues(
        &self,
        statuses: &[IssueStatus],
        page: i64,
        limit: i64,
    ) -> StoreResult<(Vec<MoveInIssue>, i64)>;

    // ===== Comments =====

    async fn insert_comment(&self, comment: MoveInIssueComment) -> StoreResult<MoveInIssueComment>;

    /// Comments of an issue, oldest first
    async fn list_comments(&self, issue_id: Uuid) -> StoreResult<Vec<MoveInIssueComment>>;

    // ===== Notifications =====

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()>;

    async fn notification_exists(&self, user_id: Uuid, entity_id: Uuid, title: &str) -> StoreResult<bool>;

    async fn list_notifications_for(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;

    // ===== Audit =====

    async fn insert_audit_log(&self, entry: AuditLog) -> StoreResult<()>;

    async fn list_audit_logs(&self, resource_id: Uuid) -> StoreResult<Vec<AuditLog>>;
}
