//! Import event dispatcher.
//!
//! Entry point of every import run. The dispatcher resolves the owning
//! tenant (dropping the event if it no longer exists), gives the tenant its
//! broker subscription on first contact and routes the event to the driver
//! registered for the configuration's vendor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::models::{Tenant, ThirdPartyApiConfiguration};
use crate::repositories::TenantRepository;
use crate::subscriptions::SubscriptionService;
use crate::vendors::registry::VendorRegistry;
use crate::vendors::VendorImport;

use super::MeasurementImport;

/// Signal that one configuration is due for an import run. Carries the full
/// configuration so handling never races a concurrent configuration edit.
#[derive(Debug, Clone)]
pub struct DataImportEvent {
    pub configuration: ThirdPartyApiConfiguration,
}

pub struct ImportEventDispatcher {
    tenants: TenantRepository,
    subscriptions: Arc<SubscriptionService>,
    registry: Arc<VendorRegistry>,
    import: MeasurementImport,
}

impl ImportEventDispatcher {
    pub fn new(
        tenants: TenantRepository,
        subscriptions: Arc<SubscriptionService>,
        registry: Arc<VendorRegistry>,
        import: MeasurementImport,
    ) -> Self {
        Self {
            tenants,
            subscriptions,
            registry,
            import,
        }
    }

    /// Handles one scheduled import event.
    pub async fn handle(&self, event: DataImportEvent) {
        debug!(
            configuration_id = %event.configuration.id,
            vendor = %event.configuration.manufacturer,
            "received import event"
        );
        let Some((tenant, driver)) = self.prepare(&event).await else {
            return;
        };
        self.import.run(driver, &tenant, &event.configuration).await;
    }

    /// Handles an operator-triggered replay from an explicit start.
    pub async fn handle_historical(&self, event: DataImportEvent, start: DateTime<Utc>) {
        debug!(
            configuration_id = %event.configuration.id,
            vendor = %event.configuration.manufacturer,
            start = %start,
            "received historical import event"
        );
        let Some((tenant, driver)) = self.prepare(&event).await else {
            return;
        };
        self.import
            .run_historical(driver, &tenant, &event.configuration, start)
            .await;
    }

    async fn prepare(&self, event: &DataImportEvent) -> Option<(Tenant, Arc<dyn VendorImport>)> {
        let tenant = self.resolve_tenant(event)?;
        self.subscriptions.ensure_subscribed(&tenant).await;
        let driver = self.driver_for(&event.configuration);
        Some((tenant, driver))
    }

    fn resolve_tenant(&self, event: &DataImportEvent) -> Option<Tenant> {
        match self.tenants.get(&event.configuration.tenant_id) {
            Ok(Some(tenant)) => Some(tenant),
            Ok(None) => {
                error!(
                    tenant_id = %event.configuration.tenant_id,
                    configuration_id = %event.configuration.id,
                    "dropping import event, tenant does not exist"
                );
                None
            }
            Err(err) => {
                error!(
                    tenant_id = %event.configuration.tenant_id,
                    error = %err,
                    "dropping import event, tenant lookup failed"
                );
                None
            }
        }
    }

    /// A configuration whose vendor has no registered driver is a wiring
    /// bug, not a runtime condition. Crash instead of silently losing data.
    fn driver_for(&self, configuration: &ThirdPartyApiConfiguration) -> Arc<dyn VendorImport> {
        self.registry
            .get(configuration.manufacturer)
            .unwrap_or_else(|err| panic!("{err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiware::{
        EntityStore, StoreError, SubscriptionError, SubscriptionGateway,
    };
    use crate::import::{EntityPersister, ImportSettings};
    use crate::models::{DeviceMeasurement, EntityType, Group, Manufacturer};
    use crate::monitoring::JobMonitor;
    use crate::repositories::{
        ApplicationStore, GroupRepository, SubscriptionStatusRepository,
        ThirdPartyApiConfigurationRepository,
    };
    use crate::vendors::{DeviceSeries, FetchError, FetchWindow};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingVendor {
        manufacturer: Manufacturer,
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VendorImport for CountingVendor {
        fn manufacturer(&self) -> Manufacturer {
            self.manufacturer
        }

        async fn fetch(
            &self,
            _configuration: &ThirdPartyApiConfiguration,
            _window: &FetchWindow,
        ) -> Result<Vec<DeviceSeries>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    struct NullStore;

    #[async_trait]
    impl EntityStore for NullStore {
        async fn append_entity(
            &self,
            _tenant: &Tenant,
            _group: &Group,
            _entity: &DeviceMeasurement,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct RecordingGateway {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SubscriptionGateway for RecordingGateway {
        async fn subscribe(
            &self,
            _tenant: &Tenant,
            _entity_types: &[EntityType],
        ) -> Result<(), SubscriptionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: ImportEventDispatcher,
        gateway: Arc<RecordingGateway>,
        soilscout_fetches: Arc<AtomicUsize>,
        farm21_fetches: Arc<AtomicUsize>,
    }

    fn fixture(registered: &[Manufacturer]) -> (Fixture, Arc<ApplicationStore>) {
        let app = Arc::new(ApplicationStore::in_memory());
        let soilscout_fetches = Arc::new(AtomicUsize::new(0));
        let farm21_fetches = Arc::new(AtomicUsize::new(0));
        let mut registry = VendorRegistry::new();
        for manufacturer in registered {
            let fetches = match manufacturer {
                Manufacturer::SoilScout => Arc::clone(&soilscout_fetches),
                Manufacturer::Farm21 => Arc::clone(&farm21_fetches),
                Manufacturer::Agvolution => Arc::new(AtomicUsize::new(0)),
            };
            registry.register(Arc::new(CountingVendor {
                manufacturer: *manufacturer,
                fetches,
            }));
        }
        let gateway = Arc::new(RecordingGateway {
            calls: AtomicUsize::new(0),
        });
        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::clone(&gateway) as Arc<dyn SubscriptionGateway>,
            SubscriptionStatusRepository::new(Arc::clone(&app)),
            true,
        ));
        let import = MeasurementImport::new(
            EntityPersister::new(
                GroupRepository::new(Arc::clone(&app)),
                Arc::new(NullStore) as Arc<dyn EntityStore>,
            ),
            ThirdPartyApiConfigurationRepository::new(Arc::clone(&app)),
            Arc::new(JobMonitor::new()),
            ImportSettings::default(),
        );
        let dispatcher = ImportEventDispatcher::new(
            TenantRepository::new(Arc::clone(&app)),
            subscriptions,
            Arc::new(registry),
            import,
        );
        (
            Fixture {
                dispatcher,
                gateway,
                soilscout_fetches,
                farm21_fetches,
            },
            app,
        )
    }

    fn event(tenant_id: &str, manufacturer: Manufacturer) -> DataImportEvent {
        DataImportEvent {
            configuration: ThirdPartyApiConfiguration::new(
                tenant_id,
                manufacturer,
                "https://api.example",
            ),
        }
    }

    #[tokio::test]
    async fn events_for_unknown_tenants_are_dropped() {
        let (fx, _app) = fixture(&[Manufacturer::SoilScout]);

        fx.dispatcher
            .handle(event("ghost", Manufacturer::SoilScout))
            .await;

        assert_eq!(fx.soilscout_fetches.load(Ordering::SeqCst), 0);
        assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn events_are_routed_to_the_driver_of_their_vendor() {
        let (fx, app) = fixture(&[Manufacturer::SoilScout, Manufacturer::Farm21]);
        TenantRepository::new(Arc::clone(&app))
            .create("farm1", "Farm One", None)
            .unwrap();

        fx.dispatcher
            .handle(event("farm1", Manufacturer::Farm21))
            .await;

        assert_eq!(fx.farm21_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(fx.soilscout_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "no import driver registered")]
    async fn an_unregistered_vendor_is_fatal() {
        let (fx, app) = fixture(&[Manufacturer::SoilScout]);
        TenantRepository::new(Arc::clone(&app))
            .create("farm1", "Farm One", None)
            .unwrap();

        fx.dispatcher
            .handle(event("farm1", Manufacturer::Agvolution))
            .await;
    }

    #[tokio::test]
    async fn the_subscription_is_registered_once_per_tenant() {
        let (fx, app) = fixture(&[Manufacturer::SoilScout]);
        TenantRepository::new(Arc::clone(&app))
            .create("farm1", "Farm One", None)
            .unwrap();

        for _ in 0..3 {
            fx.dispatcher
                .handle(event("farm1", Manufacturer::SoilScout))
                .await;
        }

        assert_eq!(fx.gateway.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.soilscout_fetches.load(Ordering::SeqCst), 3);
    }
}
