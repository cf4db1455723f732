//! Lease provisioning - makes sure an offer has a lease before issues attach to it

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::lease::{Lease, LeaseStatus, Offer, Participants, Property};
use crate::store::MoveInStore;

#[derive(Clone)]
pub struct LeaseProvisioner {
    store: Arc<dyn MoveInStore>,
}

impl LeaseProvisioner {
    pub fn new(store: Arc<dyn MoveInStore>) -> Self {
        Self { store }
    }

    /// Return the open lease for an offer, creating it (and a default unit) if absent.
    ///
    /// Safe to call repeatedly and concurrently: the store only ever keeps one open
    /// lease per offer and hands back the existing row on conflict.
    pub async fn ensure_lease_for_offer(&self, offer: &Offer, property: &Property) -> ApiResult<Lease> {
        if let Some(lease) = self.store.find_lease_for_offer(offer.id).await? {
            return Ok(lease);
        }

        let start_date = offer.lease_start_date.ok_or_else(|| {
            ApiError::InvalidState("Offer has no lease start date".to_string())
        })?;

        let unit = self.store.ensure_default_unit(property.id).await?;

        let now = Utc::now();
        let candidate = Lease {
            id: Uuid::new_v4(),
            offer_id: offer.id,
            property_id: property.id,
            unit_id: unit.id,
            tenant_group_id: offer.tenant_group_id,
            organization_id: property.organization_id,
            status: LeaseStatus::Active,
            start_date,
            end_date: offer.lease_end_date,
            rent_amount: offer.rent_amount,
            deposit_amount: offer.deposit_amount,
            created_at: now,
            updated_at: now,
        };

        let lease = self.store.insert_lease_if_absent(candidate).await?;
        tracing::info!(
            offer_id = %offer.id,
            lease_id = %lease.id,
            unit_id = %lease.unit_id,
            "Lease provisioned for offer"
        );

        Ok(lease)
    }

    /// Resolve tenant-group members and organization owners
    pub async fn participants(&self, tenant_group_id: Uuid, organization_id: Uuid) -> ApiResult<Participants> {
        let tenant_ids = self.store.tenant_group_members(tenant_group_id).await?;
        let owner_ids = self.store.organization_owners(organization_id).await?;
        Ok(Participants {
            tenant_ids,
            owner_ids,
        })
    }

    pub async fn participants_for_lease(&self, lease: &Lease) -> ApiResult<Participants> {
        self.participants(lease.tenant_group_id, lease.organization_id)
            .await
    }
}
