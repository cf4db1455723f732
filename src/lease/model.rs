//! Offer, lease and property models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Move-in verification state of an accepted offer
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "move_in_verification_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveInVerificationStatus {
    Pending,
    Success,
    IssueReported,
}

/// Accepted rental offer awaiting move-in confirmation
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Offer {
    pub id: Uuid,
    /// Primary tenant on the offer
    pub tenant_id: Uuid,
    pub landlord_id: Uuid,
    pub property_id: Uuid,
    pub tenant_group_id: Uuid,
    pub lease_start_date: Option<DateTime<Utc>>,
    pub lease_end_date: Option<DateTime<Utc>>,
    pub rent_amount: f64,
    pub deposit_amount: f64,
    pub move_in_verification_status: Option<MoveInVerificationStatus>,
    pub move_in_verification_deadline: Option<DateTime<Utc>>,
    pub move_in_verification_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_pending_verification(&self) -> bool {
        self.move_in_verification_status == Some(MoveInVerificationStatus::Pending)
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "property_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
    Available,
    Rented,
    Hold,
    Inactive,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Property {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub status: PropertyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Unit {
    pub id: Uuid,
    pub property_id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "lease_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaseStatus {
    Pending,
    Active,
    Cancelled,
    Terminated,
    Expired,
}

impl LeaseStatus {
    /// Open leases count towards the one-lease-per-offer limit
    pub fn is_open(&self) -> bool {
        matches!(self, LeaseStatus::Pending | LeaseStatus::Active)
    }
}

/// Legal tenancy record produced from an offer
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Lease {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub property_id: Uuid,
    pub unit_id: Uuid,
    pub tenant_group_id: Uuid,
    pub organization_id: Uuid,
    pub status: LeaseStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub rent_amount: f64,
    pub deposit_amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everyone with a stake in a lease: tenant-group members and organization owners
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Participants {
    pub tenant_ids: Vec<Uuid>,
    pub owner_ids: Vec<Uuid>,
}

impl Participants {
    pub fn is_tenant(&self, user_id: Uuid) -> bool {
        self.tenant_ids.contains(&user_id)
    }

    pub fn is_owner(&self, user_id: Uuid) -> bool {
        self.owner_ids.contains(&user_id)
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.is_tenant(user_id) || self.is_owner(user_id)
    }

    /// All participants, deduplicated, tenants first
    pub fn all(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(self.tenant_ids.len() + self.owner_ids.len());
        for id in self.tenant_ids.iter().chain(self.owner_ids.iter()) {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    pub fn all_except(&self, user_id: Uuid) -> Vec<Uuid> {
        self.all().into_iter().filter(|id| *id != user_id).collect()
    }
}
