//! Move-in issue routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::move_in;
use crate::state::AppState;

pub fn move_in_routes() -> Router<AppState> {
    Router::new()
        .route("/move-in-issues", post(move_in::create_issue))
        .route("/move-in-issues/:id", get(move_in::get_issue))
        .route("/move-in-issues/:id/comments", post(move_in::add_comment))
        .route("/move-in-issues/:id/status", put(move_in::update_status))
        .route(
            "/move-in-issues/:id/request-admin-review",
            post(move_in::request_admin_review),
        )
        .route(
            "/move-in-issues/:id/admin-decision",
            post(move_in::apply_admin_decision),
        )
}
