//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::TokenVerifier;
use crate::issue::{DecisionService, IssueService};
use crate::lease::LeaseProvisioner;
use crate::notification::Notifier;
use crate::store::MoveInStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MoveInStore>,
    pub issue_service: Arc<IssueService>,
    pub decision_service: Arc<DecisionService>,
    pub token_verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MoveInStore>,
        issue_service: Arc<IssueService>,
        decision_service: Arc<DecisionService>,
        token_verifier: Arc<TokenVerifier>,
    ) -> Self {
        Self {
            store,
            issue_service,
            decision_service,
            token_verifier,
        }
    }

    /// Wire the issue and decision services over one store
    pub fn with_store(store: Arc<dyn MoveInStore>, jwt_secret: &str, property_hold_days: i64) -> Self {
        let notifier = Notifier::new(store.clone());
        let leases = LeaseProvisioner::new(store.clone());

        let issue_service = Arc::new(IssueService::new(
            store.clone(),
            notifier.clone(),
            leases.clone(),
        ));
        let decision_service = Arc::new(DecisionService::new(
            store.clone(),
            notifier,
            leases,
            property_hold_days,
        ));

        Self::new(
            store,
            issue_service,
            decision_service,
            Arc::new(TokenVerifier::new(jwt_secret)),
        )
    }
}

impl FromRef<AppState> for Arc<IssueService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.issue_service.clone()
    }
}

impl FromRef<AppState> for Arc<DecisionService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.decision_service.clone()
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.token_verifier.clone()
    }
}
