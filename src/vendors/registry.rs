//! Vendor registry
//!
//! Lookup table of import driver implementations keyed by manufacturer.
//! Built once during startup and shared immutably afterwards, so lookups
//! need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::models::Manufacturer;

use super::VendorImport;

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("no import driver registered for vendor '{manufacturer}'")]
    DriverNotRegistered { manufacturer: Manufacturer },
}

/// Registry of vendor import drivers.
#[derive(Clone, Default)]
pub struct VendorRegistry {
    drivers: HashMap<Manufacturer, Arc<dyn VendorImport>>,
}

impl VendorRegistry {
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// Registers a driver under its manufacturer tag, replacing any driver
    /// previously registered for the same vendor.
    pub fn register(&mut self, driver: Arc<dyn VendorImport>) {
        let manufacturer = driver.manufacturer();
        debug!(vendor = %manufacturer, "registered vendor import driver");
        self.drivers.insert(manufacturer, driver);
    }

    /// Looks up the driver for a manufacturer.
    pub fn get(&self, manufacturer: Manufacturer) -> Result<Arc<dyn VendorImport>, RegistryError> {
        self.drivers
            .get(&manufacturer)
            .cloned()
            .ok_or(RegistryError::DriverNotRegistered { manufacturer })
    }

    /// All registered manufacturers, sorted by tag.
    pub fn manufacturers(&self) -> Vec<Manufacturer> {
        let mut manufacturers: Vec<Manufacturer> = self.drivers.keys().copied().collect();
        manufacturers.sort_by_key(|m| m.as_str());
        manufacturers
    }
}
