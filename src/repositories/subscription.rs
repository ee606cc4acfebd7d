//! Subscription status repository.
//!
//! Tracks which tenants already have a broker subscription registered. The
//! flag is persisted with the rest of the application data so a restart does
//! not trigger duplicate registrations.

use std::sync::Arc;

use crate::error::RepositoryError;

use super::ApplicationStore;

#[derive(Clone)]
pub struct SubscriptionStatusRepository {
    store: Arc<ApplicationStore>,
}

impl SubscriptionStatusRepository {
    pub fn new(store: Arc<ApplicationStore>) -> Self {
        Self { store }
    }

    pub fn is_sent(&self, tenant_id: &str) -> Result<bool, RepositoryError> {
        self.store
            .read(|data| data.subscriptions_sent.contains(tenant_id))
    }

    pub fn mark_sent(&self, tenant_id: &str) -> Result<(), RepositoryError> {
        self.store.write(|data| {
            data.subscriptions_sent.insert(tenant_id.to_string());
            Ok(())
        })
    }

    /// Clears the flag so the next import event re-registers.
    pub fn reset(&self, tenant_id: &str) -> Result<(), RepositoryError> {
        self.store.write(|data| {
            data.subscriptions_sent.remove(tenant_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_start_unset_and_stick_once_marked() {
        let repo = SubscriptionStatusRepository::new(Arc::new(ApplicationStore::in_memory()));
        assert!(!repo.is_sent("farm1").unwrap());

        repo.mark_sent("farm1").unwrap();
        assert!(repo.is_sent("farm1").unwrap());
        assert!(!repo.is_sent("farm2").unwrap());

        repo.reset("farm1").unwrap();
        assert!(!repo.is_sent("farm1").unwrap());
    }
}
