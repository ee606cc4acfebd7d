//! Device group repository.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::RepositoryError;
use crate::models::Group;

use super::ApplicationStore;

/// Read/write access to device groups.
#[derive(Clone)]
pub struct GroupRepository {
    store: Arc<ApplicationStore>,
}

impl GroupRepository {
    pub fn new(store: Arc<ApplicationStore>) -> Self {
        Self { store }
    }

    /// Creates an explicit (non-default) group for a tenant.
    pub fn create(
        &self,
        tenant_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Group, RepositoryError> {
        self.store.write(|data| {
            if !data.tenants.iter().any(|t| t.tenant_id == tenant_id) {
                return Err(RepositoryError::TenantNotFound(tenant_id.to_string()));
            }
            let group = Group {
                oid: Uuid::new_v4().to_string(),
                tenant_id: tenant_id.to_string(),
                name: name.to_string(),
                description,
                default_group_for_tenant: false,
                sensor_ids: Vec::new(),
            };
            data.groups.push(group.clone());
            Ok(group)
        })
    }

    /// The implicit default group every tenant owns.
    pub fn default_group(&self, tenant_id: &str) -> Result<Group, RepositoryError> {
        self.store.read(|data| {
            data.groups
                .iter()
                .find(|g| g.tenant_id == tenant_id && g.default_group_for_tenant)
                .cloned()
        })?
        .ok_or_else(|| RepositoryError::TenantNotFound(tenant_id.to_string()))
    }

    /// Resolves the group a sensor is assigned to, falling back to the
    /// tenant's default group when the sensor has no explicit assignment.
    pub fn find_group_by_tenant_and_sensor_id(
        &self,
        tenant_id: &str,
        sensor_id: &str,
    ) -> Result<Group, RepositoryError> {
        let assigned = self.store.read(|data| {
            data.groups
                .iter()
                .find(|g| {
                    g.tenant_id == tenant_id && g.sensor_ids.iter().any(|id| id == sensor_id)
                })
                .cloned()
        })?;
        match assigned {
            Some(group) => Ok(group),
            None => self.default_group(tenant_id),
        }
    }

    /// Assigns a sensor to a group, removing it from any other group of the
    /// same tenant first so a sensor belongs to at most one group.
    pub fn assign_sensor_to_group(
        &self,
        tenant_id: &str,
        group_oid: &str,
        sensor_id: &str,
    ) -> Result<Group, RepositoryError> {
        self.store.write(|data| {
            if !data
                .groups
                .iter()
                .any(|g| g.tenant_id == tenant_id && g.oid == group_oid)
            {
                return Err(RepositoryError::GroupNotFound(group_oid.to_string()));
            }
            for group in data.groups.iter_mut().filter(|g| g.tenant_id == tenant_id) {
                group.sensor_ids.retain(|id| id != sensor_id);
            }
            let target = data
                .groups
                .iter_mut()
                .find(|g| g.tenant_id == tenant_id && g.oid == group_oid)
                .ok_or_else(|| RepositoryError::GroupNotFound(group_oid.to_string()))?;
            target.sensor_ids.push(sensor_id.to_string());
            Ok(target.clone())
        })
    }

    pub fn list_for_tenant(&self, tenant_id: &str) -> Result<Vec<Group>, RepositoryError> {
        self.store.read(|data| {
            data.groups
                .iter()
                .filter(|g| g.tenant_id == tenant_id)
                .cloned()
                .collect()
        })
    }
}
