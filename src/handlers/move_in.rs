//! Move-in issue HTTP handlers
//!
//! Tenants and landlords report, discuss and progress issues here; the admin
//! decision endpoint lives on the same resource but requires the admin role.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{AdminUser, AuthenticatedUser};
use crate::error::ApiError;
use crate::issue::{
    AddCommentRequest, AdminDecisionRequest, AdminReviewRequest, CreateIssueRequest,
    CreateIssueResponse, IssueWithComments, MoveInIssue, MoveInIssueComment,
    UpdateIssueStatusRequest,
};
use crate::state::AppState;

/// POST /move-in-issues - 201 when created, 200 when an open issue was reused
pub async fn create_issue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateIssueRequest>,
) -> Result<(StatusCode, Json<CreateIssueResponse>), ApiError> {
    let response = state.issue_service.create_issue(user.user_id, req).await?;

    let status = if response.reused {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

/// GET /move-in-issues/:id
pub async fn get_issue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(issue_id): Path<Uuid>,
) -> Result<Json<IssueWithComments>, ApiError> {
    let issue = state
        .issue_service
        .get_issue(issue_id, user.user_id, user.role)
        .await?;

    Ok(Json(issue))
}

/// POST /move-in-issues/:id/comments
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(issue_id): Path<Uuid>,
    Json(req): Json<AddCommentRequest>,
) -> Result<(StatusCode, Json<MoveInIssueComment>), ApiError> {
    let comment = state
        .issue_service
        .add_comment(issue_id, user.user_id, user.role, req)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// PUT /move-in-issues/:id/status
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(issue_id): Path<Uuid>,
    Json(req): Json<UpdateIssueStatusRequest>,
) -> Result<Json<MoveInIssue>, ApiError> {
    let issue = state
        .issue_service
        .update_status(issue_id, &req.status, user.user_id, user.role)
        .await?;

    Ok(Json(issue))
}

/// POST /move-in-issues/:id/request-admin-review
pub async fn request_admin_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(issue_id): Path<Uuid>,
    req: Option<Json<AdminReviewRequest>>,
) -> Result<Json<MoveInIssueComment>, ApiError> {
    let reason = req.map(|Json(r)| r.reason).unwrap_or_default();
    let comment = state
        .issue_service
        .request_admin_review(issue_id, user.user_id, &reason)
        .await?;

    Ok(Json(comment))
}

/// POST /move-in-issues/:id/admin-decision
pub async fn apply_admin_decision(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(issue_id): Path<Uuid>,
    Json(req): Json<AdminDecisionRequest>,
) -> Result<Json<MoveInIssue>, ApiError> {
    let issue = state
        .decision_service
        .apply_admin_decision(issue_id, admin.user_id, req)
        .await?;

    Ok(Json(issue))
}
