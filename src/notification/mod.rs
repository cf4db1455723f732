//! Notification domain module
//!
//! Notification records and the fire-and-forget sink used by every state transition.

mod model;
mod service;

pub use model::*;
pub use service::Notifier;
