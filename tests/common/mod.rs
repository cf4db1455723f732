//! Shared fixtures for the integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use movein_server::issue::{CreateIssueRequest, DecisionService, IssueService};
use movein_server::lease::{
    LeaseProvisioner, MoveInVerificationStatus, Offer, Property, PropertyStatus,
};
use movein_server::notification::Notifier;
use movein_server::store::{MemoryStore, MoveInStore};
use movein_server::verification::VerificationService;

pub const HOLD_DAYS: i64 = 30;

/// One rental: a tenant group of two, an organization with one owner, an admin
/// and an unrelated user, plus an offer in PENDING verification.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub tenant: Uuid,
    pub co_tenant: Uuid,
    pub landlord: Uuid,
    pub admin: Uuid,
    pub outsider: Uuid,
    pub offer_id: Uuid,
    pub property_id: Uuid,
    pub organization_id: Uuid,
    pub tenant_group_id: Uuid,
}

impl Fixture {
    /// Offer whose lease started `started_ago` before now
    pub async fn started(started_ago: Duration) -> Self {
        Self::with_offer(Some(Utc::now() - started_ago), Some(MoveInVerificationStatus::Pending)).await
    }

    pub async fn with_offer(
        lease_start: Option<DateTime<Utc>>,
        status: Option<MoveInVerificationStatus>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        let fixture = Self {
            store,
            tenant: Uuid::new_v4(),
            co_tenant: Uuid::new_v4(),
            landlord: Uuid::new_v4(),
            admin: Uuid::new_v4(),
            outsider: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            tenant_group_id: Uuid::new_v4(),
        };

        let now = Utc::now();
        fixture
            .store
            .insert_property(Property {
                id: fixture.property_id,
                organization_id: fixture.organization_id,
                title: "Garden flat".to_string(),
                status: PropertyStatus::Rented,
                created_at: now,
                updated_at: now,
            })
            .await;
        fixture
            .store
            .insert_offer(Offer {
                id: fixture.offer_id,
                tenant_id: fixture.tenant,
                landlord_id: fixture.landlord,
                property_id: fixture.property_id,
                tenant_group_id: fixture.tenant_group_id,
                lease_start_date: lease_start,
                lease_end_date: lease_start.map(|start| start + Duration::days(365)),
                rent_amount: 1200.0,
                deposit_amount: 2400.0,
                move_in_verification_status: status,
                move_in_verification_deadline: lease_start.map(|start| start + Duration::hours(24)),
                move_in_verification_date: None,
                created_at: now,
                updated_at: now,
            })
            .await;

        fixture
            .store
            .add_tenant_group_member(fixture.tenant_group_id, fixture.tenant)
            .await;
        fixture
            .store
            .add_tenant_group_member(fixture.tenant_group_id, fixture.co_tenant)
            .await;
        fixture
            .store
            .add_organization_owner(fixture.organization_id, fixture.landlord)
            .await;
        fixture.store.set_display_name(fixture.tenant, "Tess Tenant").await;
        fixture.store.set_display_name(fixture.landlord, "Lou Landlord").await;

        fixture
    }

    pub fn dyn_store(&self) -> Arc<dyn MoveInStore> {
        self.store.clone()
    }

    pub fn issue_service(&self) -> IssueService {
        let store = self.dyn_store();
        IssueService::new(
            store.clone(),
            Notifier::new(store.clone()),
            LeaseProvisioner::new(store),
        )
    }

    pub fn decision_service(&self) -> DecisionService {
        let store = self.dyn_store();
        DecisionService::new(
            store.clone(),
            Notifier::new(store.clone()),
            LeaseProvisioner::new(store),
            HOLD_DAYS,
        )
    }

    pub fn verification_service(&self) -> VerificationService {
        let store = self.dyn_store();
        VerificationService::new(store.clone(), Notifier::new(store), 10)
    }

    pub fn report(&self, title: &str) -> CreateIssueRequest {
        CreateIssueRequest {
            offer_id: self.offer_id,
            title: title.to_string(),
            description: "The boiler does not turn on and there is a leak under the sink".to_string(),
            evidence: Vec::new(),
        }
    }

    /// File an issue as the primary tenant and return its id
    pub async fn open_issue(&self) -> Uuid {
        self.issue_service()
            .create_issue(self.tenant, self.report("Broken boiler"))
            .await
            .expect("issue should be created")
            .issue
            .id
    }

    pub async fn offer_status(&self) -> Option<MoveInVerificationStatus> {
        self.store
            .get_offer(self.offer_id)
            .await
            .unwrap()
            .and_then(|offer| offer.move_in_verification_status)
    }

    pub async fn notifications_titled(&self, user_id: Uuid, title: &str) -> usize {
        self.store
            .notifications()
            .await
            .iter()
            .filter(|n| n.user_id == user_id && n.title == title)
            .count()
    }
}
