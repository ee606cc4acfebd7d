//! Tenant model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// An isolated customer context. Owns device groups, third-party API
/// configurations and the prefix all of its entity ids carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tenant {
    /// Unique tenant identifier, alphanumeric, at most 50 characters
    pub tenant_id: String,
    /// Human readable name of the tenant
    pub name: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Prefix prepended to every entity id published for this tenant
    pub entity_prefix: String,
    /// Timestamp the tenant was created at
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Derives the entity id prefix for a tenant id.
    pub fn entity_prefix_for(tenant_id: &str) -> String {
        format!("urn:{}:", tenant_id)
    }

    /// Builds the entity id for one of this tenant's devices.
    pub fn entity_id(&self, device_id: &str) -> String {
        format!("{}{}", self.entity_prefix, device_id)
    }
}
