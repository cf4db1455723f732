//! Admin routes

use axum::{routing::get, Router};

use crate::handlers::admin;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/move-in/issues", get(admin::list_move_in_issues))
}
