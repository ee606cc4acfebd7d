//! Entity mapper and persist wrapper.
//!
//! Turns the per-channel candidates of one fetched record into broker
//! entities: resolves the device's group (default fallback with a warning),
//! prefixes the device id with the tenant's entity prefix and upserts each
//! entity independently, so one rejected channel never blocks the others.

use std::sync::Arc;

use tracing::warn;

use crate::error::RepositoryError;
use crate::fiware::EntityStore;
use crate::models::{DeviceMeasurement, Tenant};
use crate::repositories::GroupRepository;
use crate::vendors::MeasurementCandidate;

/// Outcome of persisting one record's entities.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistReport {
    /// Entities accepted by the broker
    pub persisted: usize,
    /// Entities that failed and were skipped
    pub failed: usize,
}

pub struct EntityPersister {
    groups: GroupRepository,
    store: Arc<dyn EntityStore>,
}

impl EntityPersister {
    pub fn new(groups: GroupRepository, store: Arc<dyn EntityStore>) -> Self {
        Self { groups, store }
    }

    /// Persists every candidate of one fetched record. The group is
    /// resolved once per record; group resolution failure fails the whole
    /// record, everything later is isolated per entity.
    pub async fn persist(
        &self,
        tenant: &Tenant,
        device_id: &str,
        candidates: &[MeasurementCandidate],
    ) -> Result<PersistReport, RepositoryError> {
        let group = self
            .groups
            .find_group_by_tenant_and_sensor_id(&tenant.tenant_id, device_id)?;
        if group.default_group_for_tenant {
            warn!(
                tenant_id = %tenant.tenant_id,
                sensor_id = device_id,
                "no group set for the sensor, using the tenant's default group"
            );
        }

        let mut report = PersistReport::default();
        for candidate in candidates {
            let entity = DeviceMeasurement {
                id: tenant.entity_id(&candidate.device_id),
                entity_type: candidate.entity_type,
                group_oid: group.oid.clone(),
                channel: candidate.channel.clone(),
                value: candidate.value,
                date_observed: candidate.measured_at,
                external_data_reference: candidate.external_data_reference.clone(),
                latitude: candidate.latitude,
                longitude: candidate.longitude,
            };
            match self.store.append_entity(tenant, &group, &entity).await {
                Ok(()) => report.persisted += 1,
                Err(err) => {
                    warn!(
                        entity_id = %entity.id,
                        channel = %entity.channel,
                        error = %err,
                        "failed to persist measurement entity"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}
