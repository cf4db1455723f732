pub mod decision;
pub mod model;
pub mod service;

pub use decision::DecisionService;
pub use model::*;
pub use service::{IssueService, MAX_ADMIN_QUEUE_PAGE};
