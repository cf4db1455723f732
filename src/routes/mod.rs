//! Route definitions for the move-in API

mod admin;
mod health;
mod move_in;

pub use admin::admin_routes;
pub use health::health_routes;
pub use move_in::move_in_routes;

use axum::Router;

use crate::state::AppState;

/// Every API route, without middleware layers
pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(health_routes())
        .merge(move_in_routes())
        .merge(admin_routes())
}
