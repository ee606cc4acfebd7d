//! Third-party API configuration model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Manufacturer;

/// Access data for one (tenant, vendor) pair.
///
/// `last_run` is the only field the pipeline mutates: it is advanced to the
/// end of the fetched window after a run whose fetch succeeded, and left
/// untouched otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThirdPartyApiConfiguration {
    /// Unique identifier of the configuration
    pub id: Uuid,
    /// Identifier of the owning tenant
    pub tenant_id: String,
    /// The vendor this configuration imports from
    pub manufacturer: Manufacturer,
    /// Disabled configurations are skipped by the scheduler
    pub enabled: bool,
    /// Base URL of the vendor API
    pub url: String,
    /// Username for vendors with credential login
    pub username: Option<String>,
    /// Password for vendors with credential login
    pub password: Option<String>,
    /// Static API token for vendors with token auth
    pub api_token: Option<String>,
    /// End of the last successfully fetched window, `None` before the
    /// initial import has completed
    pub last_run: Option<DateTime<Utc>>,
}

impl ThirdPartyApiConfiguration {
    /// Creates an enabled configuration with a fresh id and no run history.
    pub fn new(tenant_id: impl Into<String>, manufacturer: Manufacturer, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            manufacturer,
            enabled: true,
            url: url.into(),
            username: None,
            password: None,
            api_token: None,
            last_run: None,
        }
    }
}
