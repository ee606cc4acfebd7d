//! # Data Models
//!
//! This module contains the domain models shared across the fieldbridge
//! pipeline: tenants, device groups, third-party API configurations and the
//! normalized measurement entities pushed to the context broker.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod configuration;
pub mod group;
pub mod manufacturer;
pub mod measurement;
pub mod tenant;

pub use configuration::ThirdPartyApiConfiguration;
pub use group::Group;
pub use manufacturer::{ALL_ENTITY_TYPES, ALL_MANUFACTURERS, EntityType, Manufacturer};
pub use measurement::DeviceMeasurement;
pub use tenant::Tenant;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "fieldbridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
