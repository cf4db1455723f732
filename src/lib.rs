//! Move-in verification backend
//!
//! Library exports for the move-in verification and issue-resolution service:
//! deadline policy and scheduler, the issue lifecycle, admin decisions and the
//! HTTP surface that drives them.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod issue;
pub mod lease;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod routes;
pub mod state;
pub mod store;
pub mod verification;
