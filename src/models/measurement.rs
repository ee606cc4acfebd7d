//! Normalized measurement entity.
//!
//! One entity per measured channel is published to the context broker. The
//! JSON shape follows NGSI v2 attribute conventions: every attribute is an
//! object carrying `type` and `value`, the location is a GeoJSON point.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::EntityType;

/// A single measured channel of one device, ready for upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceMeasurement {
    /// Tenant-prefixed entity id
    pub id: String,
    /// Entity type key the measurement is published under
    pub entity_type: EntityType,
    /// Object id of the group the device resolves to
    pub group_oid: String,
    /// Name of the measured channel, e.g. `temperature`
    pub channel: String,
    /// Measured value
    pub value: f64,
    /// Observation timestamp reported by the vendor
    pub date_observed: DateTime<Utc>,
    /// Optional reference to external payload data, e.g. an image URL
    pub external_data_reference: Option<String>,
    /// Device latitude in decimal degrees
    pub latitude: f64,
    /// Device longitude in decimal degrees
    pub longitude: f64,
}

impl DeviceMeasurement {
    /// Renders the NGSI v2 entity document sent to the context broker.
    pub fn to_ngsi_json(&self) -> Value {
        let external_data_reference = match &self.external_data_reference {
            Some(reference) => json!({"type": "Text", "value": reference}),
            None => json!({}),
        };
        json!({
            "id": self.id,
            "type": self.entity_type.key(),
            "customGroup": {"type": "Text", "value": self.group_oid},
            "controlledProperty": {"type": "Text", "value": self.channel},
            "numValue": {"type": "Number", "value": self.value},
            "dateObserved": {"type": "DateTime", "value": self.date_observed.to_rfc3339()},
            "externalDataReference": external_data_reference,
            "location": {
                "type": "geo:json",
                "value": {"type": "Point", "coordinates": [self.longitude, self.latitude]},
            },
        })
    }
}
