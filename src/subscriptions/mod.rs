//! # Subscription Management
//!
//! Ensures every tenant gets exactly one broker subscription covering all
//! measurement entity types. Registration happens lazily on the first import
//! event for a tenant; the sent flag is persisted so neither later events
//! nor a restart re-register. A failed registration leaves the flag unset
//! and the next event retries (the broker deduplicates on its side).

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::fiware::SubscriptionGateway;
use crate::models::{ALL_ENTITY_TYPES, Tenant};
use crate::repositories::SubscriptionStatusRepository;

pub struct SubscriptionService {
    gateway: Arc<dyn SubscriptionGateway>,
    status: SubscriptionStatusRepository,
    enabled: bool,
}

impl SubscriptionService {
    pub fn new(
        gateway: Arc<dyn SubscriptionGateway>,
        status: SubscriptionStatusRepository,
        enabled: bool,
    ) -> Self {
        Self {
            gateway,
            status,
            enabled,
        }
    }

    /// Whether a registration attempt should be made for this tenant:
    /// subscriptions are enabled and the tenant's flag is still unset.
    pub fn send_out_subscriptions(&self, tenant_id: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match self.status.is_sent(tenant_id) {
            Ok(sent) => !sent,
            Err(err) => {
                error!(tenant_id, error = %err, "could not read subscription status");
                false
            }
        }
    }

    /// Marks the tenant's subscription as registered.
    pub fn subscription_sent(&self, tenant_id: &str) {
        if let Err(err) = self.status.mark_sent(tenant_id) {
            error!(tenant_id, error = %err, "could not persist subscription status");
        }
    }

    /// Registers the subscription if this tenant still needs one. Failures
    /// are logged and swallowed; the flag stays unset so the next import
    /// event retries.
    pub async fn ensure_subscribed(&self, tenant: &Tenant) {
        if !self.send_out_subscriptions(&tenant.tenant_id) {
            debug!(tenant_id = %tenant.tenant_id, "subscription already registered or disabled");
            return;
        }
        match self.gateway.subscribe(tenant, &ALL_ENTITY_TYPES).await {
            Ok(()) => {
                info!(tenant_id = %tenant.tenant_id, "registered measurement subscriptions");
                self.subscription_sent(&tenant.tenant_id);
            }
            Err(err) => {
                error!(
                    tenant_id = %tenant.tenant_id,
                    error = %err,
                    "subscription registration failed, retrying on the next import event"
                );
            }
        }
    }
}
