//! PostgreSQL implementation of the persistence gateway

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{MoveInStore, StoreError, StoreResult};
use crate::db::check_health;
use crate::issue::{AdminDecisionUpdate, AuditLog, IssueStatus, MoveInIssue, MoveInIssueComment, StatusTransition};
use crate::lease::{Lease, LeaseStatus, Offer, Property, PropertyStatus, Unit};
use crate::notification::Notification;

#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
}

impl PgStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl MoveInStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        check_health(&self.db_pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn get_offer(&self, offer_id: Uuid) -> StoreResult<Option<Offer>> {
        let offer = sqlx::query_as::<_, Offer>("SELECT * FROM offers WHERE id = $1")
            .bind(offer_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(offer)
    }

    async fn list_pending_verifications(&self) -> StoreResult<Vec<Offer>> {
        let offers = sqlx::query_as::<_, Offer>(
            r#"
            SELECT * FROM offers
            WHERE move_in_verification_status = 'PENDING'
              AND move_in_verification_deadline IS NOT NULL
            ORDER BY move_in_verification_deadline ASC
            "#,
        )
        .fetch_all(&self.db_pool)
        .await?;

        Ok(offers)
    }

    async fn start_verification(&self, offer_id: Uuid, deadline: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET move_in_verification_status = 'PENDING',
                move_in_verification_deadline = $1,
                updated_at = $2
            WHERE id = $3
              AND (move_in_verification_status IS NULL OR move_in_verification_status = 'PENDING')
            "#,
        )
        .bind(deadline)
        .bind(Utc::now())
        .bind(offer_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn finalize_verification(&self, offer_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET move_in_verification_status = 'SUCCESS',
                move_in_verification_date = $1,
                updated_at = $1
            WHERE id = $2 AND move_in_verification_status = 'PENDING'
            "#,
        )
        .bind(now)
        .bind(offer_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_issue_reported(&self, offer_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET move_in_verification_status = 'ISSUE_REPORTED', updated_at = $1
            WHERE id = $2 AND move_in_verification_status = 'PENDING'
            "#,
        )
        .bind(Utc::now())
        .bind(offer_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_issue_report(&self, offer_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET move_in_verification_status = 'PENDING', updated_at = $1
            WHERE id = $2
              AND move_in_verification_status = 'ISSUE_REPORTED'
              AND NOT EXISTS (
                  SELECT 1 FROM move_in_issues i
                  JOIN leases l ON l.id = i.lease_id
                  WHERE l.offer_id = $2
              )
            "#,
        )
        .bind(Utc::now())
        .bind(offer_id)
        .execute(&self.db_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn tenant_group_members(&self, tenant_group_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            "SELECT user_id FROM tenant_group_members WHERE tenant_group_id = $1 ORDER BY joined_at",
        )
        .bind(tenant_group_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn organization_owners(&self, organization_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let rows = sqlx::query_as::<_, (Uuid,)>(
            r#"
            SELECT user_id FROM organization_members
            WHERE organization_id = $1 AND role = 'OWNER'
            ORDER BY joined_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn display_name(&self, user_id: Uuid) -> StoreResult<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>("SELECT display_name FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(row.map(|(name,)| name))
    }

    async fn get_property(&self, property_id: Uuid) -> StoreResult<Option<Property>> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
            .bind(property_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(property)
    }

    async fn set_property_status(&self, property_id: Uuid, status: PropertyStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE properties SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(Utc::now())
            .bind(property_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ensure_default_unit(&self, property_id: Uuid) -> StoreResult<Unit> {
        let existing = sqlx::query_as::<_, Unit>(
            "SELECT * FROM units WHERE property_id = $1 ORDER BY created_at ASC LIMIT 1",
        )
        .bind(property_id)
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(unit) = existing {
            return Ok(unit);
        }

        let unit = sqlx::query_as::<_, Unit>(
            r#"
            INSERT INTO units (id, property_id, label, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(property_id)
        .bind("Main unit")
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        Ok(unit)
    }

    async fn find_lease_for_offer(&self, offer_id: Uuid) -> StoreResult<Option<Lease>> {
        let lease = sqlx::query_as::<_, Lease>(
            r#"
            SELECT * FROM leases
            WHERE offer_id = $1 AND status IN ('PENDING', 'ACTIVE')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(offer_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(lease)
    }

    async fn insert_lease_if_absent(&self, lease: Lease) -> StoreResult<Lease> {
        let inserted = sqlx::query_as::<_, Lease>(
            r#"
            INSERT INTO leases (
                id, offer_id, property_id, unit_id, tenant_group_id, organization_id,
                status, start_date, end_date, rent_amount, deposit_amount,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (offer_id) WHERE status IN ('PENDING', 'ACTIVE') DO NOTHING
            RETURNING *
            "#,
        )
        .bind(lease.id)
        .bind(lease.offer_id)
        .bind(lease.property_id)
        .bind(lease.unit_id)
        .bind(lease.tenant_group_id)
        .bind(lease.organization_id)
        .bind(lease.status)
        .bind(lease.start_date)
        .bind(lease.end_date)
        .bind(lease.rent_amount)
        .bind(lease.deposit_amount)
        .bind(lease.created_at)
        .bind(lease.updated_at)
        .fetch_optional(&self.db_pool)
        .await?;

        match inserted {
            Some(lease) => Ok(lease),
            // Lost the race: another request created the open lease first
            None => self.find_lease_for_offer(lease.offer_id).await?.ok_or_else(|| {
                super::StoreError::Backend(format!(
                    "Lease insert for offer {} conflicted but no open lease was found",
                    lease.offer_id
                ))
            }),
        }
    }

    async fn get_lease(&self, lease_id: Uuid) -> StoreResult<Option<Lease>> {
        let lease = sqlx::query_as::<_, Lease>("SELECT * FROM leases WHERE id = $1")
            .bind(lease_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(lease)
    }

    async fn set_lease_status(&self, lease_id: Uuid, status: LeaseStatus) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE leases SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(Utc::now())
            .bind(lease_id)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_issue_if_no_active(&self, issue: MoveInIssue) -> StoreResult<(MoveInIssue, bool)> {
        let inserted = sqlx::query_as::<_, MoveInIssue>(
            r#"
            INSERT INTO move_in_issues (
                id, lease_id, reported_by, title, description, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (lease_id) WHERE status IN ('OPEN', 'IN_PROGRESS') DO NOTHING
            RETURNING *
            "#,
        )
        .bind(issue.id)
        .bind(issue.lease_id)
        .bind(issue.reported_by)
        .bind(&issue.title)
        .bind(&issue.description)
        .bind(issue.status)
        .bind(issue.created_at)
        .bind(issue.updated_at)
        .fetch_optional(&self.db_pool)
        .await?;

        if let Some(created) = inserted {
            return Ok((created, true));
        }

        let existing = sqlx::query_as::<_, MoveInIssue>(
            r#"
            SELECT * FROM move_in_issues
            WHERE lease_id = $1 AND status IN ('OPEN', 'IN_PROGRESS')
            LIMIT 1
            "#,
        )
        .bind(issue.lease_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match existing {
            Some(existing) => Ok((existing, false)),
            None => Err(super::StoreError::Backend(format!(
                "Issue insert for lease {} conflicted but no active issue was found",
                issue.lease_id
            ))),
        }
    }

    async fn get_issue(&self, issue_id: Uuid) -> StoreResult<Option<MoveInIssue>> {
        let issue = sqlx::query_as::<_, MoveInIssue>("SELECT * FROM move_in_issues WHERE id = $1")
            .bind(issue_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(issue)
    }

    async fn touch_issue(&self, issue_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE move_in_issues SET updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(issue_id)
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    async fn transition_issue(
        &self,
        issue_id: Uuid,
        from: IssueStatus,
        transition: &StatusTransition,
    ) -> StoreResult<Option<MoveInIssue>> {
        let resolved_at = transition.resolved_by.map(|_| transition.at);

        let issue = sqlx::query_as::<_, MoveInIssue>(
            r#"
            UPDATE move_in_issues
            SET status = $1,
                updated_at = $2,
                resolved_at = COALESCE($3, resolved_at),
                resolved_by_user_id = COALESCE($4, resolved_by_user_id)
            WHERE id = $5
              AND status = $6
              AND status IN ('OPEN', 'IN_PROGRESS')
              AND admin_decision IS NULL
            RETURNING *
            "#,
        )
        .bind(transition.to)
        .bind(transition.at)
        .bind(resolved_at)
        .bind(transition.resolved_by)
        .bind(issue_id)
        .bind(from)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(issue)
    }

    async fn record_admin_decision(
        &self,
        issue_id: Uuid,
        update: &AdminDecisionUpdate,
    ) -> StoreResult<Option<MoveInIssue>> {
        let issue = sqlx::query_as::<_, MoveInIssue>(
            r#"
            UPDATE move_in_issues
            SET admin_decision = $1,
                status = $2,
                admin_decision_at = $3,
                admin_decision_by = $4,
                admin_notes = $5,
                refund_amount = $6,
                property_hold_until = $7,
                updated_at = $3
            WHERE id = $8 AND admin_decision IS NULL
            RETURNING *
            "#,
        )
        .bind(update.decision)
        .bind(update.status)
        .bind(update.decided_at)
        .bind(update.decided_by)
        .bind(&update.notes)
        .bind(update.refund_amount)
        .bind(update.property_hold_until)
        .bind(issue_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(issue)
    }

    async fn list_issues(
        &self,
        statuses: &[IssueStatus],
        page: i64,
        limit: i64,
    ) -> StoreResult<(Vec<MoveInIssue>, i64)> {
        let offset = (page - 1).max(0).saturating_mul(limit);

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM move_in_issues WHERE status = ANY($1)")
                .bind(statuses)
                .fetch_one(&self.db_pool)
                .await?;

        let issues = sqlx::query_as::<_, MoveInIssue>(
            r#"
            SELECT * FROM move_in_issues
            WHERE status = ANY($1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(statuses)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db_pool)
        .await?;

        Ok((issues, total))
    }

    async fn insert_comment(&self, comment: MoveInIssueComment) -> StoreResult<MoveInIssueComment> {
        let comment = sqlx::query_as::<_, MoveInIssueComment>(
            r#"
            INSERT INTO move_in_issue_comments (
                id, issue_id, author_id, content, evidence, evidence_type, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(comment.id)
        .bind(comment.issue_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(&comment.evidence)
        .bind(comment.evidence_type)
        .bind(comment.created_at)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(comment)
    }

    async fn list_comments(&self, issue_id: Uuid) -> StoreResult<Vec<MoveInIssueComment>> {
        let comments = sqlx::query_as::<_, MoveInIssueComment>(
            "SELECT * FROM move_in_issue_comments WHERE issue_id = $1 ORDER BY created_at ASC",
        )
        .bind(issue_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(comments)
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, type, entity_id, title, body, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.notification_type)
        .bind(notification.entity_id)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn notification_exists(&self, user_id: Uuid, entity_id: Uuid, title: &str) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM notifications
                WHERE user_id = $1 AND entity_id = $2 AND title = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(entity_id)
        .bind(title)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(exists)
    }

    async fn list_notifications_for(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(notifications)
    }

    async fn insert_audit_log(&self, entry: AuditLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, admin_id, action, resource_type, resource_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(entry.admin_id)
        .bind(&entry.action)
        .bind(&entry.resource_type)
        .bind(entry.resource_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    async fn list_audit_logs(&self, resource_id: Uuid) -> StoreResult<Vec<AuditLog>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE resource_id = $1 ORDER BY created_at ASC",
        )
        .bind(resource_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(entries)
    }
}
