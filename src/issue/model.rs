//! Move-in issue models and data structures

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgHasArrayType, PgTypeInfo};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Prefix of the comment written by a tenant's admin review request
pub const ADMIN_REVIEW_TAG: &str = "[ADMIN_REVIEW_REQUEST]";

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "move_in_issue_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
    AdminApproved,
    AdminRejected,
    Escalated,
}

impl PgHasArrayType for IssueStatus {
    fn array_type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("_move_in_issue_status")
    }
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 7] = [
        IssueStatus::Open,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
        IssueStatus::Closed,
        IssueStatus::AdminApproved,
        IssueStatus::AdminRejected,
        IssueStatus::Escalated,
    ];

    /// Targets accepted by the general status update
    pub const UPDATABLE: [IssueStatus; 4] = [
        IssueStatus::Open,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
        IssueStatus::Closed,
    ];

    /// Default filter of the admin queue
    pub const ADMIN_QUEUE_DEFAULT: [IssueStatus; 2] = [IssueStatus::Open, IssueStatus::Escalated];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "OPEN",
            IssueStatus::InProgress => "IN_PROGRESS",
            IssueStatus::Resolved => "RESOLVED",
            IssueStatus::Closed => "CLOSED",
            IssueStatus::AdminApproved => "ADMIN_APPROVED",
            IssueStatus::AdminRejected => "ADMIN_REJECTED",
            IssueStatus::Escalated => "ESCALATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|status| status.as_str() == wanted)
    }

    /// At most one active issue may exist per lease
    pub fn is_active(&self) -> bool {
        matches!(self, IssueStatus::Open | IssueStatus::InProgress)
    }

    pub fn is_updatable_target(&self) -> bool {
        Self::UPDATABLE.contains(self)
    }
}

/// Final admin decision on an issue.
///
/// `Accepted`/`Approve` and `Rejected`/`Reject` are kept as distinct variants because
/// they land the issue in different statuses.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "admin_decision", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminDecision {
    Accepted,
    Rejected,
    Escalated,
    ResolvedApproved,
    ResolvedRejected,
    Approve,
    Reject,
}

impl AdminDecision {
    pub const ALL: [AdminDecision; 7] = [
        AdminDecision::Accepted,
        AdminDecision::Rejected,
        AdminDecision::Escalated,
        AdminDecision::ResolvedApproved,
        AdminDecision::ResolvedRejected,
        AdminDecision::Approve,
        AdminDecision::Reject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminDecision::Accepted => "ACCEPTED",
            AdminDecision::Rejected => "REJECTED",
            AdminDecision::Escalated => "ESCALATED",
            AdminDecision::ResolvedApproved => "RESOLVED_APPROVED",
            AdminDecision::ResolvedRejected => "RESOLVED_REJECTED",
            AdminDecision::Approve => "APPROVE",
            AdminDecision::Reject => "REJECT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|decision| decision.as_str() == wanted)
    }

    /// Issue status recorded alongside the decision
    pub fn resulting_status(&self) -> IssueStatus {
        match self {
            AdminDecision::Accepted => IssueStatus::AdminApproved,
            AdminDecision::Approve => IssueStatus::Resolved,
            AdminDecision::Rejected => IssueStatus::AdminRejected,
            AdminDecision::Reject => IssueStatus::Closed,
            AdminDecision::Escalated
            | AdminDecision::ResolvedApproved
            | AdminDecision::ResolvedRejected => IssueStatus::Escalated,
        }
    }

    /// Approvals require a refund and trigger lease cancellation plus a property hold
    pub fn is_approval(&self) -> bool {
        matches!(self, AdminDecision::Accepted | AdminDecision::Approve)
    }

    pub fn audit_action(&self) -> String {
        format!("ADMIN_DECISION_{}", self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "evidence_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceType {
    Image,
    Video,
    Document,
}

impl EvidenceType {
    const IMAGE_EXTENSIONS: [&'static str; 7] = ["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp"];
    const VIDEO_EXTENSIONS: [&'static str; 6] = ["mp4", "mov", "avi", "webm", "mkv", "m4v"];

    /// Classify an evidence list by the extension of its first file
    pub fn from_paths(paths: &[String]) -> Option<Self> {
        let first = paths.first()?;
        let extension = first
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        if Self::IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(EvidenceType::Image)
        } else if Self::VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(EvidenceType::Video)
        } else {
            Some(EvidenceType::Document)
        }
    }
}

/// Tenant-raised dispute about the state of a unit at move-in
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct MoveInIssue {
    pub id: Uuid,
    pub lease_id: Uuid,
    pub reported_by: Uuid,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by_user_id: Option<Uuid>,
    pub admin_decision: Option<AdminDecision>,
    pub admin_decision_at: Option<DateTime<Utc>>,
    pub admin_decision_by: Option<Uuid>,
    pub admin_notes: Option<String>,
    pub refund_amount: Option<f64>,
    pub property_hold_until: Option<NaiveDate>,
}

impl MoveInIssue {
    pub fn is_decided(&self) -> bool {
        self.admin_decision.is_some()
    }
}

/// Threaded message on an issue; never edited
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct MoveInIssueComment {
    pub id: Uuid,
    pub issue_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub evidence: Vec<String>,
    pub evidence_type: Option<EvidenceType>,
    pub created_at: DateTime<Utc>,
}

impl MoveInIssueComment {
    pub fn new(issue_id: Uuid, author_id: Uuid, content: String, evidence: Vec<String>) -> Self {
        let evidence_type = EvidenceType::from_paths(&evidence);
        Self {
            id: Uuid::new_v4(),
            issue_id,
            author_id,
            content,
            evidence,
            evidence_type,
            created_at: Utc::now(),
        }
    }
}

/// Conditional status change applied by the store
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub to: IssueStatus,
    pub at: DateTime<Utc>,
    /// Set when the transition resolves the issue; stamps resolved_at as well
    pub resolved_by: Option<Uuid>,
}

/// Fields written when an admin decides an issue
#[derive(Debug, Clone)]
pub struct AdminDecisionUpdate {
    pub decision: AdminDecision,
    pub status: IssueStatus,
    pub decided_at: DateTime<Utc>,
    pub decided_by: Uuid,
    pub notes: Option<String>,
    pub refund_amount: Option<f64>,
    pub property_hold_until: Option<NaiveDate>,
}

/// Immutable record of an administrative action
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct AuditLog {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ===== Request/Response DTOs =====

#[derive(Debug, Deserialize, Validate)]
pub struct CreateIssueRequest {
    #[serde(alias = "offerId")]
    pub offer_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters"))]
    pub description: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 evidence files"))]
    pub evidence: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateIssueResponse {
    pub issue: MoveInIssue,
    pub reused: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCommentRequest {
    #[validate(length(max = 5000, message = "Comment must be at most 5000 characters"))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 evidence files"))]
    pub evidence: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIssueStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AdminDecisionRequest {
    pub decision: String,
    pub notes: Option<String>,
    #[serde(alias = "refundAmount")]
    pub refund_amount: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AdminReviewRequest {
    #[serde(default)]
    pub reason: String,
}

/// Query parameters of the admin queue; `status` is a comma separated list
#[derive(Debug, Deserialize, Default)]
pub struct AdminIssueQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IssueWithComments {
    #[serde(flatten)]
    pub issue: MoveInIssue,
    pub comments: Vec<MoveInIssueComment>,
}
