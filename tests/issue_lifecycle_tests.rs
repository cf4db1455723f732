//! Issue reporting, comments and status transitions against the in-memory store

mod common;

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    use movein_server::error::ApiError;
    use movein_server::issue::{
        AddCommentRequest, AdminIssueQuery, EvidenceType, IssueStatus, ADMIN_REVIEW_TAG,
        MAX_ADMIN_QUEUE_PAGE,
    };
    use movein_server::lease::{LeaseStatus, MoveInVerificationStatus};
    use movein_server::models::UserRole;
    use movein_server::notification::NotificationType;
    use movein_server::store::{FailPoint, MoveInStore};

    use crate::common::Fixture;

    fn comment(content: &str) -> AddCommentRequest {
        AddCommentRequest {
            content: content.to_string(),
            evidence: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_report_creates_lease_issue_and_notifications() {
        let fx = Fixture::started(Duration::hours(2)).await;

        let mut request = fx.report("Broken boiler");
        request.evidence = vec!["uploads/boiler.jpg".to_string(), "uploads/leak.mp4".to_string()];

        let response = fx
            .issue_service()
            .create_issue(fx.tenant, request)
            .await
            .unwrap();

        assert!(!response.reused);
        assert_eq!(response.issue.status, IssueStatus::Open);
        assert_eq!(response.issue.reported_by, fx.tenant);
        assert_eq!(
            fx.offer_status().await,
            Some(MoveInVerificationStatus::IssueReported)
        );

        let leases = fx.store.leases().await;
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].offer_id, fx.offer_id);
        assert_eq!(leases[0].status, LeaseStatus::Active);
        assert_eq!(response.issue.lease_id, leases[0].id);
        assert_eq!(fx.store.units().await.len(), 1);

        // Evidence lands on an initial comment
        let view = fx
            .issue_service()
            .get_issue(response.issue.id, fx.tenant, UserRole::Tenant)
            .await
            .unwrap();
        assert_eq!(view.comments.len(), 1);
        assert_eq!(view.comments[0].evidence.len(), 2);
        assert_eq!(view.comments[0].evidence_type, Some(EvidenceType::Image));

        // Everyone but the reporter hears about it
        let reported: Vec<_> = fx
            .store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::MoveInIssueReported)
            .collect();
        assert_eq!(reported.len(), 2);
        assert!(reported.iter().all(|n| n.user_id != fx.tenant));
        assert!(reported.iter().any(|n| n.user_id == fx.co_tenant));
        assert!(reported.iter().any(|n| n.user_id == fx.landlord));
    }

    #[tokio::test]
    async fn test_second_report_reuses_active_issue() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let service = fx.issue_service();

        let first = service
            .create_issue(fx.tenant, fx.report("Broken boiler"))
            .await
            .unwrap();
        let second = service
            .create_issue(fx.co_tenant, fx.report("Mould in bathroom"))
            .await
            .unwrap();

        assert!(second.reused);
        assert_eq!(second.issue.id, first.issue.id);
        assert_eq!(fx.store.issues().await.len(), 1);
        assert_eq!(fx.store.leases().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reports_create_one_issue() {
        let fx = Arc::new(Fixture::started(Duration::hours(2)).await);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let fx = fx.clone();
                tokio::spawn(async move {
                    let reporter = if i % 2 == 0 { fx.tenant } else { fx.co_tenant };
                    fx.issue_service()
                        .create_issue(reporter, fx.report("Broken boiler"))
                        .await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let response = handle.await.unwrap().unwrap();
            if !response.reused {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(fx.store.issues().await.len(), 1);
        assert_eq!(fx.store.leases().await.len(), 1);
    }

    #[tokio::test]
    async fn test_report_before_move_in_is_window_closed() {
        let fx = Fixture::with_offer(
            Some(Utc::now() + Duration::hours(3)),
            Some(MoveInVerificationStatus::Pending),
        )
        .await;

        let result = fx
            .issue_service()
            .create_issue(fx.tenant, fx.report("Too early"))
            .await;

        assert!(matches!(result, Err(ApiError::WindowClosed(_))));
        assert!(fx.store.issues().await.is_empty());
        assert_eq!(fx.offer_status().await, Some(MoveInVerificationStatus::Pending));
    }

    #[tokio::test]
    async fn test_report_after_deadline_is_window_expired() {
        let fx = Fixture::started(Duration::hours(25)).await;

        let result = fx
            .issue_service()
            .create_issue(fx.tenant, fx.report("Too late"))
            .await;

        assert!(matches!(result, Err(ApiError::WindowExpired(_))));
        assert!(fx.store.issues().await.is_empty());
    }

    #[tokio::test]
    async fn test_report_requires_lease_start_date() {
        let fx = Fixture::with_offer(None, None).await;

        let result = fx
            .issue_service()
            .create_issue(fx.tenant, fx.report("No date"))
            .await;

        assert!(matches!(result, Err(ApiError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_report_after_confirmation_is_rejected() {
        let fx = Fixture::with_offer(
            Some(Utc::now() - Duration::hours(2)),
            Some(MoveInVerificationStatus::Success),
        )
        .await;

        let result = fx
            .issue_service()
            .create_issue(fx.tenant, fx.report("Already confirmed"))
            .await;

        assert!(matches!(result, Err(ApiError::InvalidState(_))));
        assert!(fx.store.leases().await.is_empty());
    }

    #[tokio::test]
    async fn test_report_rejects_non_participants_and_bad_input() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let service = fx.issue_service();

        let outsider = service
            .create_issue(fx.outsider, fx.report("Not mine"))
            .await;
        assert!(matches!(outsider, Err(ApiError::Forbidden(_))));

        let mut empty_title = fx.report("");
        empty_title.title.clear();
        let invalid = service.create_issue(fx.tenant, empty_title).await;
        assert!(matches!(invalid, Err(ApiError::ValidationError(_))));

        let mut missing_offer = fx.report("Unknown offer");
        missing_offer.offer_id = uuid::Uuid::new_v4();
        let missing = service.create_issue(fx.tenant, missing_offer).await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        assert!(fx.store.issues().await.is_empty());
    }

    #[tokio::test]
    async fn test_landlord_can_report_too() {
        let fx = Fixture::started(Duration::hours(1)).await;

        let response = fx
            .issue_service()
            .create_issue(fx.landlord, fx.report("Tenant reports damage"))
            .await
            .unwrap();

        assert!(!response.reused);
        assert_eq!(response.issue.reported_by, fx.landlord);
    }

    #[tokio::test]
    async fn test_comments_are_ordered_and_notify_others() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let issue_id = fx.open_issue().await;
        let service = fx.issue_service();

        service
            .add_comment(issue_id, fx.tenant, UserRole::Tenant, comment("Photos attached"))
            .await
            .unwrap();
        service
            .add_comment(issue_id, fx.landlord, UserRole::Landlord, comment("Plumber booked"))
            .await
            .unwrap();
        service
            .add_comment(issue_id, fx.admin, UserRole::Admin, comment("Following this"))
            .await
            .unwrap();

        let view = service
            .get_issue(issue_id, fx.co_tenant, UserRole::Tenant)
            .await
            .unwrap();
        let contents: Vec<_> = view.comments.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["Photos attached", "Plumber booked", "Following this"]);
        assert!(view.issue.updated_at >= view.issue.created_at);

        let comment_notices: Vec<_> = fx
            .store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::MoveInIssueComment)
            .collect();
        // 2 + 2 + 3 recipients; the admin is not a participant
        assert_eq!(comment_notices.len(), 7);
    }

    #[tokio::test]
    async fn test_comment_rules() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let issue_id = fx.open_issue().await;
        let service = fx.issue_service();

        let blank = service
            .add_comment(issue_id, fx.tenant, UserRole::Tenant, comment("   "))
            .await;
        assert!(matches!(blank, Err(ApiError::ValidationError(_))));

        let outsider = service
            .add_comment(issue_id, fx.outsider, UserRole::Tenant, comment("Hello"))
            .await;
        assert!(matches!(outsider, Err(ApiError::Forbidden(_))));

        let missing = service
            .add_comment(uuid::Uuid::new_v4(), fx.tenant, UserRole::Tenant, comment("Hello"))
            .await;
        assert!(matches!(missing, Err(ApiError::NotFound(_))));

        let viewer = service
            .get_issue(issue_id, fx.outsider, UserRole::Landlord)
            .await;
        assert!(matches!(viewer, Err(ApiError::Forbidden(_))));
        assert!(service.get_issue(issue_id, fx.admin, UserRole::Admin).await.is_ok());
    }

    #[tokio::test]
    async fn test_admin_review_request_tags_comment_only() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let issue_id = fx.open_issue().await;
        let service = fx.issue_service();

        let tagged = service
            .request_admin_review(issue_id, fx.co_tenant, "Landlord is not responding")
            .await
            .unwrap();
        assert!(tagged.content.starts_with(ADMIN_REVIEW_TAG));
        assert!(tagged.content.contains("Landlord is not responding"));

        let issue = fx.store.issues().await.remove(0);
        assert_eq!(issue.status, IssueStatus::Open);

        let landlord_request = service
            .request_admin_review(issue_id, fx.landlord, "")
            .await;
        assert!(matches!(landlord_request, Err(ApiError::Forbidden(_))));

        assert_eq!(
            fx.notifications_titled(fx.landlord, "Admin review requested").await,
            1
        );
    }

    #[tokio::test]
    async fn test_status_update_role_policy() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let issue_id = fx.open_issue().await;
        let service = fx.issue_service();

        for status in ["IN_PROGRESS", "RESOLVED", "CLOSED", "OPEN"] {
            let result = service
                .update_status(issue_id, status, fx.tenant, UserRole::Tenant)
                .await;
            assert!(matches!(result, Err(ApiError::Forbidden(_))));
        }

        let skip_ahead = service
            .update_status(issue_id, "RESOLVED", fx.landlord, UserRole::Landlord)
            .await;
        assert!(matches!(skip_ahead, Err(ApiError::Forbidden(_))));

        let stranger = service
            .update_status(issue_id, "IN_PROGRESS", fx.outsider, UserRole::Landlord)
            .await;
        assert!(matches!(stranger, Err(ApiError::Forbidden(_))));

        let in_progress = service
            .update_status(issue_id, "in_progress", fx.landlord, UserRole::Landlord)
            .await
            .unwrap();
        assert_eq!(in_progress.status, IssueStatus::InProgress);
        assert!(in_progress.resolved_at.is_none());

        // Only OPEN -> IN_PROGRESS for landlords
        let again = service
            .update_status(issue_id, "IN_PROGRESS", fx.landlord, UserRole::Landlord)
            .await;
        assert!(matches!(again, Err(ApiError::Forbidden(_))));

        let resolved = service
            .update_status(issue_id, "RESOLVED", fx.admin, UserRole::Admin)
            .await
            .unwrap();
        assert_eq!(resolved.status, IssueStatus::Resolved);
        assert_eq!(resolved.resolved_by_user_id, Some(fx.admin));
        assert!(resolved.resolved_at.is_some());

        let changes = fx
            .store
            .notifications()
            .await
            .into_iter()
            .filter(|n| n.notification_type == NotificationType::MoveInIssueStatusChanged)
            .count();
        assert_eq!(changes, 6);
    }

    #[tokio::test]
    async fn test_status_update_rejects_decision_only_statuses() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let issue_id = fx.open_issue().await;

        for status in ["ADMIN_APPROVED", "ESCALATED", "ARCHIVED"] {
            let result = fx
                .issue_service()
                .update_status(issue_id, status, fx.admin, UserRole::Admin)
                .await;
            assert!(matches!(result, Err(ApiError::ValidationError(_))));
        }
    }

    #[tokio::test]
    async fn test_admin_queue_filters_and_paginates() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let issue_id = fx.open_issue().await;
        let service = fx.issue_service();

        let default_queue = service
            .list_admin_queue(AdminIssueQuery::default())
            .await
            .unwrap();
        assert_eq!(default_queue.total, 1);
        assert_eq!(default_queue.page, 1);
        assert_eq!(default_queue.limit, 20);
        assert_eq!(default_queue.data[0].id, issue_id);

        service
            .update_status(issue_id, "CLOSED", fx.admin, UserRole::Admin)
            .await
            .unwrap();

        let open_only = service
            .list_admin_queue(AdminIssueQuery::default())
            .await
            .unwrap();
        assert_eq!(open_only.total, 0);

        let closed = service
            .list_admin_queue(AdminIssueQuery {
                status: Some("closed, resolved".to_string()),
                page: Some(0),
                limit: Some(500),
            })
            .await
            .unwrap();
        assert_eq!(closed.total, 1);
        assert_eq!(closed.page, 1);
        assert_eq!(closed.limit, 100);

        let invalid = service
            .list_admin_queue(AdminIssueQuery {
                status: Some("OPEN,NOPE".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(invalid, Err(ApiError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_closed_issue_cannot_be_reopened() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let first = fx.open_issue().await;
        let service = fx.issue_service();

        service
            .update_status(first, "CLOSED", fx.admin, UserRole::Admin)
            .await
            .unwrap();

        let second = service
            .create_issue(fx.co_tenant, fx.report("Mould in the bathroom"))
            .await
            .unwrap();
        assert!(!second.reused);

        for status in ["OPEN", "IN_PROGRESS", "RESOLVED"] {
            let reopen = service
                .update_status(first, status, fx.admin, UserRole::Admin)
                .await;
            assert!(matches!(reopen, Err(ApiError::InvalidState(_))), "{}", status);
        }

        let active: Vec<_> = fx
            .store
            .issues()
            .await
            .into_iter()
            .filter(|issue| issue.status.is_active())
            .collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second.issue.id);

        let closed = fx.store.get_issue(first).await.unwrap().unwrap();
        assert_eq!(closed.status, IssueStatus::Closed);
    }

    #[tokio::test]
    async fn test_admin_queue_rejects_out_of_range_page() {
        let fx = Fixture::started(Duration::hours(2)).await;
        fx.open_issue().await;
        let service = fx.issue_service();

        let huge = service
            .list_admin_queue(AdminIssueQuery {
                page: Some(i64::MAX),
                limit: Some(100),
                ..Default::default()
            })
            .await;
        assert!(matches!(huge, Err(ApiError::ValidationError(_))));

        let last = service
            .list_admin_queue(AdminIssueQuery {
                page: Some(MAX_ADMIN_QUEUE_PAGE),
                limit: Some(100),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(last.data.is_empty());
        assert_eq!(last.total, 1);
        assert_eq!(last.page as i64, MAX_ADMIN_QUEUE_PAGE);
    }

    #[tokio::test]
    async fn test_failed_issue_insert_keeps_offer_pending() {
        let fx = Fixture::started(Duration::hours(2)).await;
        let service = fx.issue_service();

        fx.store.set_failing(FailPoint::InsertIssue, true).await;
        let failed = service
            .create_issue(fx.tenant, fx.report("Broken boiler"))
            .await;
        assert!(matches!(failed, Err(ApiError::DatabaseError(_))));
        assert_eq!(fx.offer_status().await, Some(MoveInVerificationStatus::Pending));
        assert!(fx.store.issues().await.is_empty());

        // Still finalizable by the scheduler, and a retry goes through
        let pending = fx.store.list_pending_verifications().await.unwrap();
        assert_eq!(pending.len(), 1);

        fx.store.set_failing(FailPoint::InsertIssue, false).await;
        let retried = service
            .create_issue(fx.tenant, fx.report("Broken boiler"))
            .await
            .unwrap();
        assert!(!retried.reused);
        assert_eq!(
            fx.offer_status().await,
            Some(MoveInVerificationStatus::IssueReported)
        );
    }

    #[tokio::test]
    async fn test_failed_lease_provisioning_keeps_offer_pending() {
        let fx = Fixture::started(Duration::hours(2)).await;

        fx.store.set_failing(FailPoint::InsertLease, true).await;
        let failed = fx
            .issue_service()
            .create_issue(fx.tenant, fx.report("Broken boiler"))
            .await;
        assert!(matches!(failed, Err(ApiError::DatabaseError(_))));
        assert_eq!(fx.offer_status().await, Some(MoveInVerificationStatus::Pending));
        assert!(fx.store.leases().await.is_empty());
        assert!(fx.store.issues().await.is_empty());
    }

    #[tokio::test]
    async fn test_report_claim_is_kept_once_an_issue_exists() {
        let fx = Fixture::started(Duration::hours(2)).await;
        fx.open_issue().await;

        let released = fx.store.release_issue_report(fx.offer_id).await.unwrap();
        assert!(!released);
        assert_eq!(
            fx.offer_status().await,
            Some(MoveInVerificationStatus::IssueReported)
        );
    }
}
