//! Admin dashboard handlers

use axum::{
    extract::{Query, State},
    Json,
};

use super::AdminUser;
use crate::error::ApiError;
use crate::issue::{AdminIssueQuery, MoveInIssue};
use crate::models::PaginatedResponse;
use crate::state::AppState;

/// GET /admin/move-in/issues?status=OPEN,ESCALATED&page=1&limit=20
pub async fn list_move_in_issues(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<AdminIssueQuery>,
) -> Result<Json<PaginatedResponse<MoveInIssue>>, ApiError> {
    let page = state.issue_service.list_admin_queue(query).await?;
    Ok(Json(page))
}
