//! Vendor identity.
//!
//! Every third-party sensor platform the service can import from is listed
//! here, together with the entity type its measurements are published under.
//! The set is closed: configurations referencing anything else fail to parse.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A supported third-party sensor platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Manufacturer {
    /// Soil Scout buried soil sensors.
    SoilScout,
    /// Agvolution climate sensor network.
    Agvolution,
    /// Farm21 soil moisture probes.
    Farm21,
}

/// All manufacturers the service knows about, in registration order.
pub const ALL_MANUFACTURERS: [Manufacturer; 3] = [
    Manufacturer::SoilScout,
    Manufacturer::Agvolution,
    Manufacturer::Farm21,
];

impl Manufacturer {
    /// Stable lowercase tag used in configurations, logs and metric labels.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Manufacturer::SoilScout => "soilscout",
            Manufacturer::Agvolution => "agvolution",
            Manufacturer::Farm21 => "farm21",
        }
    }

    /// Entity type measurements from this manufacturer are published under.
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Manufacturer::SoilScout => EntityType::SoilScoutSensor,
            Manufacturer::Agvolution => EntityType::AgvolutionSensor,
            Manufacturer::Farm21 => EntityType::Farm21Sensor,
        }
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity type tag carried by every normalized measurement entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum EntityType {
    SoilScoutSensor,
    AgvolutionSensor,
    Farm21Sensor,
}

/// All entity types, used when registering broker subscriptions.
pub const ALL_ENTITY_TYPES: [EntityType; 3] = [
    EntityType::SoilScoutSensor,
    EntityType::AgvolutionSensor,
    EntityType::Farm21Sensor,
];

impl EntityType {
    /// The key used as the `type` field of entities in the context broker.
    pub const fn key(&self) -> &'static str {
        match self {
            EntityType::SoilScoutSensor => "SoilScoutSensor",
            EntityType::AgvolutionSensor => "AgvolutionSensor",
            EntityType::Farm21Sensor => "Farm21Sensor",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
