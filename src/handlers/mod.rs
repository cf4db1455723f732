//! API handlers for the move-in service

pub mod admin;
pub mod health;
pub mod move_in;

pub use crate::middleware::auth::{AdminUser, AuthenticatedUser};
