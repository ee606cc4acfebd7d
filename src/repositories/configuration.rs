//! Third-party API configuration repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::ThirdPartyApiConfiguration;

use super::ApplicationStore;

/// Read/write access to third-party API configurations.
#[derive(Clone)]
pub struct ThirdPartyApiConfigurationRepository {
    store: Arc<ApplicationStore>,
}

impl ThirdPartyApiConfigurationRepository {
    pub fn new(store: Arc<ApplicationStore>) -> Self {
        Self { store }
    }

    /// Stores a configuration. The owning tenant must exist.
    pub fn create(
        &self,
        configuration: ThirdPartyApiConfiguration,
    ) -> Result<ThirdPartyApiConfiguration, RepositoryError> {
        self.store.write(|data| {
            if !data
                .tenants
                .iter()
                .any(|t| t.tenant_id == configuration.tenant_id)
            {
                return Err(RepositoryError::TenantNotFound(
                    configuration.tenant_id.clone(),
                ));
            }
            data.configurations.push(configuration.clone());
            Ok(configuration)
        })
    }

    pub fn get(&self, id: Uuid) -> Result<Option<ThirdPartyApiConfiguration>, RepositoryError> {
        self.store
            .read(|data| data.configurations.iter().find(|c| c.id == id).cloned())
    }

    /// All configurations the scheduler should consider.
    pub fn list_enabled(&self) -> Result<Vec<ThirdPartyApiConfiguration>, RepositoryError> {
        self.store.read(|data| {
            data.configurations
                .iter()
                .filter(|c| c.enabled)
                .cloned()
                .collect()
        })
    }

    /// Advances `last_run` to the end of a successfully fetched window.
    pub fn update_last_run(
        &self,
        id: Uuid,
        until: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.store.write(|data| {
            let configuration = data
                .configurations
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or(RepositoryError::ConfigurationNotFound(id))?;
            configuration.last_run = Some(until);
            Ok(())
        })
    }
}
