//! Move-in verification domain module
//!
//! Deadline policy, the reminder/finalization passes and the background scheduler.

pub mod deadline;
mod scheduler;
mod service;

pub use scheduler::VerificationScheduler;
pub use service::{TickSummary, VerificationService};
