//! Tenant repository.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::{Group, Tenant};

use super::ApplicationStore;

/// Read/write access to tenants.
#[derive(Clone)]
pub struct TenantRepository {
    store: Arc<ApplicationStore>,
}

impl TenantRepository {
    pub fn new(store: Arc<ApplicationStore>) -> Self {
        Self { store }
    }

    /// Creates a tenant together with its default device group.
    pub fn create(
        &self,
        tenant_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Tenant, RepositoryError> {
        validate_tenant_id(tenant_id)?;
        self.store.write(|data| {
            if data.tenants.iter().any(|t| t.tenant_id == tenant_id) {
                return Err(RepositoryError::TenantAlreadyExists(tenant_id.to_string()));
            }
            let tenant = Tenant {
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
                description,
                entity_prefix: Tenant::entity_prefix_for(tenant_id),
                created_at: Utc::now(),
            };
            let default_group = Group {
                oid: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                name: "default".to_string(),
                description: Some("Default group of the tenant.".to_string()),
                default_group_for_tenant: true,
                sensor_ids: Vec::new(),
            };
            data.tenants.push(tenant.clone());
            data.groups.push(default_group);
            Ok(tenant)
        })
    }

    pub fn get(&self, tenant_id: &str) -> Result<Option<Tenant>, RepositoryError> {
        self.store
            .read(|data| data.tenants.iter().find(|t| t.tenant_id == tenant_id).cloned())
    }

    pub fn list(&self) -> Result<Vec<Tenant>, RepositoryError> {
        self.store.read(|data| data.tenants.clone())
    }
}

/// Tenant ids are alphanumeric and at most 50 characters long.
fn validate_tenant_id(tenant_id: &str) -> Result<(), RepositoryError> {
    let valid = !tenant_id.is_empty()
        && tenant_id.len() <= 50
        && tenant_id.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidTenantId(tenant_id.to_string()))
    }
}
