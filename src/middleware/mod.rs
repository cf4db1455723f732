//! Middleware for the move-in API
//!
//! Request tracing and bearer-token extractors.

pub mod auth;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser};
pub use tracing::request_tracing;
