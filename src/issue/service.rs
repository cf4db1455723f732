//! Move-in issue lifecycle - reporting, comments, review requests and status changes

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::issue::{
    AddCommentRequest, AdminIssueQuery, CreateIssueRequest, CreateIssueResponse, IssueStatus,
    IssueWithComments, MoveInIssue, MoveInIssueComment, StatusTransition, ADMIN_REVIEW_TAG,
};
use crate::lease::{Lease, LeaseProvisioner, MoveInVerificationStatus, Participants};
use crate::models::{PaginatedResponse, UserRole};
use crate::notification::{NotificationTemplate, NotificationType, Notifier};
use crate::store::MoveInStore;
use crate::verification::deadline::check_reporting_window;

const INITIAL_EVIDENCE_COMMENT: &str = "Evidence submitted with the initial report.";

/// Upper bound on the admin queue page; keeps the offset and the i32 page field in range
pub const MAX_ADMIN_QUEUE_PAGE: i64 = 1_000_000;

pub struct IssueService {
    store: Arc<dyn MoveInStore>,
    notifier: Notifier,
    leases: LeaseProvisioner,
}

impl IssueService {
    pub fn new(store: Arc<dyn MoveInStore>, notifier: Notifier, leases: LeaseProvisioner) -> Self {
        Self {
            store,
            notifier,
            leases,
        }
    }

    /// File a move-in issue against an offer, or hand back the lease's open issue.
    pub async fn create_issue(
        &self,
        reporter_id: Uuid,
        request: CreateIssueRequest,
    ) -> ApiResult<CreateIssueResponse> {
        request.validate()?;

        let offer = self
            .store
            .get_offer(request.offer_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Offer not found".to_string()))?;
        let property = self
            .store
            .get_property(offer.property_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Property not found".to_string()))?;

        let participants = self
            .leases
            .participants(offer.tenant_group_id, property.organization_id)
            .await?;
        if !participants.is_participant(reporter_id) {
            return Err(ApiError::Forbidden(
                "Only tenants or owners of this rental can report move-in issues".to_string(),
            ));
        }

        let lease_start = offer.lease_start_date.ok_or_else(|| {
            ApiError::InvalidState("Offer has no lease start date".to_string())
        })?;
        check_reporting_window(lease_start, Utc::now())?;

        if offer.move_in_verification_status == Some(MoveInVerificationStatus::Success) {
            return Err(ApiError::InvalidState(
                "Move-in has already been confirmed".to_string(),
            ));
        }

        // Provisioned before the offer leaves PENDING, so a failure here leaves it untouched
        let lease = self.leases.ensure_lease_for_offer(&offer, &property).await?;

        let mut claimed_report = false;
        if offer.move_in_verification_status == Some(MoveInVerificationStatus::Pending) {
            // Races the scheduler's finalization; exactly one side leaves PENDING
            claimed_report = self.store.mark_issue_reported(offer.id).await?;
            if !claimed_report {
                let current = self.store.get_offer(offer.id).await?;
                if matches!(
                    current.and_then(|o| o.move_in_verification_status),
                    Some(MoveInVerificationStatus::Success)
                ) {
                    return Err(ApiError::WindowExpired(
                        "Move-in was confirmed before the report arrived".to_string(),
                    ));
                }
            }
        }

        let now = Utc::now();
        let candidate = MoveInIssue {
            id: Uuid::new_v4(),
            lease_id: lease.id,
            reported_by: reporter_id,
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            status: IssueStatus::Open,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            resolved_by_user_id: None,
            admin_decision: None,
            admin_decision_at: None,
            admin_decision_by: None,
            admin_notes: None,
            refund_amount: None,
            property_hold_until: None,
        };

        let (issue, created) = match self.store.insert_issue_if_no_active(candidate).await {
            Ok(inserted) => inserted,
            Err(e) => {
                if claimed_report {
                    self.release_report_claim(offer.id).await;
                }
                return Err(e.into());
            }
        };
        if !created {
            tracing::info!(
                issue_id = %issue.id,
                lease_id = %lease.id,
                "Active move-in issue already exists, reusing"
            );
            return Ok(CreateIssueResponse {
                issue,
                reused: true,
            });
        }

        if !request.evidence.is_empty() {
            let comment = MoveInIssueComment::new(
                issue.id,
                reporter_id,
                INITIAL_EVIDENCE_COMMENT.to_string(),
                request.evidence,
            );
            self.store.insert_comment(comment).await?;
        }

        let template = NotificationTemplate::new(
            NotificationType::MoveInIssueReported,
            issue.id,
            "Move-in issue reported",
            format!("A move-in issue was reported: {}", issue.title),
        );
        self.notifier
            .notify(&participants.all_except(reporter_id), &template)
            .await;

        tracing::info!(
            issue_id = %issue.id,
            lease_id = %lease.id,
            offer_id = %offer.id,
            reporter_id = %reporter_id,
            "Move-in issue created"
        );

        Ok(CreateIssueResponse {
            issue,
            reused: false,
        })
    }

    /// Put the offer back to PENDING after a report that never produced an issue
    async fn release_report_claim(&self, offer_id: Uuid) {
        match self.store.release_issue_report(offer_id).await {
            Ok(true) => tracing::warn!(
                offer_id = %offer_id,
                "Issue insert failed, offer returned to PENDING verification"
            ),
            Ok(false) => tracing::debug!(
                offer_id = %offer_id,
                "Offer already has an issue, keeping ISSUE_REPORTED"
            ),
            Err(e) => tracing::error!(
                offer_id = %offer_id,
                "Failed to return offer to PENDING after issue insert failure: {}",
                e
            ),
        }
    }

    /// Issue with its comments, for participants and admins
    pub async fn get_issue(
        &self,
        issue_id: Uuid,
        viewer_id: Uuid,
        viewer_role: UserRole,
    ) -> ApiResult<IssueWithComments> {
        let (issue, _lease, participants) = self.load(issue_id).await?;

        if !viewer_role.is_admin() && !participants.is_participant(viewer_id) {
            return Err(ApiError::Forbidden(
                "You are not a participant of this issue".to_string(),
            ));
        }

        let comments = self.store.list_comments(issue.id).await?;
        Ok(IssueWithComments { issue, comments })
    }

    pub async fn add_comment(
        &self,
        issue_id: Uuid,
        author_id: Uuid,
        author_role: UserRole,
        request: AddCommentRequest,
    ) -> ApiResult<MoveInIssueComment> {
        let (issue, _lease, participants) = self.load(issue_id).await?;

        if !author_role.is_admin() && !participants.is_participant(author_id) {
            return Err(ApiError::Forbidden(
                "You are not a participant of this issue".to_string(),
            ));
        }

        request.validate()?;
        let content = request.content.trim();
        if content.is_empty() {
            return Err(ApiError::ValidationError(
                "Comment content cannot be empty".to_string(),
            ));
        }

        let comment = MoveInIssueComment::new(
            issue.id,
            author_id,
            content.to_string(),
            request.evidence,
        );
        let comment = self.store.insert_comment(comment).await?;
        self.store.touch_issue(issue.id, comment.created_at).await?;

        let template = NotificationTemplate::new(
            NotificationType::MoveInIssueComment,
            issue.id,
            "New comment on move-in issue",
            format!("New comment on \"{}\"", issue.title),
        );
        self.notifier
            .notify(&participants.all_except(author_id), &template)
            .await;

        tracing::debug!(issue_id = %issue.id, comment_id = %comment.id, "Comment added");
        Ok(comment)
    }

    /// Tag the thread for admin attention. Status is left untouched.
    pub async fn request_admin_review(
        &self,
        issue_id: Uuid,
        tenant_id: Uuid,
        reason: &str,
    ) -> ApiResult<MoveInIssueComment> {
        let (issue, _lease, participants) = self.load(issue_id).await?;

        if !participants.is_tenant(tenant_id) {
            return Err(ApiError::Forbidden(
                "Only tenants of this lease can request an admin review".to_string(),
            ));
        }

        let reason = reason.trim();
        let content = if reason.is_empty() {
            format!("{} Tenant requested an admin review", ADMIN_REVIEW_TAG)
        } else {
            format!("{} {}", ADMIN_REVIEW_TAG, reason)
        };

        let comment = MoveInIssueComment::new(issue.id, tenant_id, content, Vec::new());
        let comment = self.store.insert_comment(comment).await?;
        self.store.touch_issue(issue.id, comment.created_at).await?;

        let template = NotificationTemplate::new(
            NotificationType::MoveInAdminReviewRequested,
            issue.id,
            "Admin review requested",
            format!("The tenant asked an admin to review \"{}\"", issue.title),
        );
        self.notifier
            .notify(&participants.all_except(tenant_id), &template)
            .await;

        tracing::info!(issue_id = %issue.id, tenant_id = %tenant_id, "Admin review requested");
        Ok(comment)
    }

    /// Role-gated status change outside the admin decision path
    pub async fn update_status(
        &self,
        issue_id: Uuid,
        new_status: &str,
        actor_id: Uuid,
        actor_role: UserRole,
    ) -> ApiResult<MoveInIssue> {
        if actor_role == UserRole::Tenant {
            return Err(ApiError::Forbidden(
                "Tenants cannot change the issue status".to_string(),
            ));
        }

        let target = IssueStatus::parse(new_status)
            .filter(IssueStatus::is_updatable_target)
            .ok_or_else(|| {
                ApiError::ValidationError(format!(
                    "Invalid status '{}'. Expected one of OPEN, IN_PROGRESS, RESOLVED, CLOSED",
                    new_status
                ))
            })?;

        let (issue, _lease, participants) = self.load(issue_id).await?;

        if !actor_role.is_admin() {
            if !participants.is_owner(actor_id) {
                return Err(ApiError::Forbidden(
                    "You are not an owner of this property".to_string(),
                ));
            }
            if target != IssueStatus::InProgress || issue.status != IssueStatus::Open {
                return Err(ApiError::Forbidden(
                    "Landlords can only move an open issue to IN_PROGRESS".to_string(),
                ));
            }
        }

        if issue.is_decided() {
            return Err(ApiError::InvalidState(
                "Issue already has an admin decision".to_string(),
            ));
        }
        if !issue.status.is_active() {
            return Err(ApiError::InvalidState(format!(
                "Issue is {} and can no longer change status",
                issue.status.as_str()
            )));
        }

        let resolves = matches!(target, IssueStatus::Resolved | IssueStatus::Closed);
        let transition = StatusTransition {
            to: target,
            at: Utc::now(),
            resolved_by: resolves.then_some(actor_id),
        };

        let updated = self
            .store
            .transition_issue(issue.id, issue.status, &transition)
            .await?
            .ok_or_else(|| {
                ApiError::InvalidState("Issue was modified concurrently, reload and retry".to_string())
            })?;

        let template = NotificationTemplate::new(
            NotificationType::MoveInIssueStatusChanged,
            updated.id,
            "Move-in issue status updated",
            format!("\"{}\" is now {}", updated.title, updated.status.as_str()),
        );
        self.notifier.notify(&participants.all(), &template).await;

        tracing::info!(
            issue_id = %updated.id,
            from = issue.status.as_str(),
            to = updated.status.as_str(),
            actor_id = %actor_id,
            "Move-in issue status changed"
        );

        Ok(updated)
    }

    /// Paginated admin queue, OPEN and ESCALATED by default
    pub async fn list_admin_queue(
        &self,
        query: AdminIssueQuery,
    ) -> ApiResult<PaginatedResponse<MoveInIssue>> {
        let statuses = match query.status.as_deref().map(str::trim) {
            None | Some("") => IssueStatus::ADMIN_QUEUE_DEFAULT.to_vec(),
            Some(raw) => raw
                .split(',')
                .map(|part| {
                    IssueStatus::parse(part).ok_or_else(|| {
                        ApiError::ValidationError(format!("Invalid status filter '{}'", part.trim()))
                    })
                })
                .collect::<ApiResult<Vec<_>>>()?,
        };

        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        if page > MAX_ADMIN_QUEUE_PAGE {
            return Err(ApiError::ValidationError(format!(
                "Page must be at most {}",
                MAX_ADMIN_QUEUE_PAGE
            )));
        }

        let (data, total) = self.store.list_issues(&statuses, page, limit).await?;

        Ok(PaginatedResponse {
            data,
            total,
            page: page as i32,
            limit: limit as i32,
        })
    }

    async fn load(&self, issue_id: Uuid) -> ApiResult<(MoveInIssue, Lease, Participants)> {
        let issue = self
            .store
            .get_issue(issue_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Move-in issue not found".to_string()))?;
        let lease = self
            .store
            .get_lease(issue.lease_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Lease not found".to_string()))?;
        let participants = self.leases.participants_for_lease(&lease).await?;

        Ok((issue, lease, participants))
    }
}
