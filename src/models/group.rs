//! Device group model.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A named collection of sensors belonging to one tenant.
///
/// Every tenant has exactly one default group; sensors without an explicit
/// assignment resolve to it. A sensor id belongs to at most one group per
/// tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Group {
    /// Object id of the group, stable across renames
    pub oid: String,
    /// Identifier of the owning tenant
    pub tenant_id: String,
    /// Human readable name of the group
    pub name: String,
    /// Optional free-form description
    pub description: Option<String>,
    /// Marks the implicit default group created alongside the tenant
    pub default_group_for_tenant: bool,
    /// Sensor ids explicitly assigned to this group
    pub sensor_ids: Vec<String>,
}

impl Group {
    /// Service path the group's entities are published under.
    pub fn service_path(&self) -> String {
        format!("/{}", self.oid)
    }
}
