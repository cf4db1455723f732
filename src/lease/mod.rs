//! Lease domain module
//!
//! Offer/lease/property models and on-demand lease provisioning.

mod model;
mod service;

pub use model::*;
pub use service::LeaseProvisioner;
