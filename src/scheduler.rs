//! # Import Scheduler
//!
//! Background task that scans enabled third-party API configurations on a
//! fixed tick and fires one dispatcher task per configuration. A running-key
//! set keyed by (tenant, vendor) keeps overlapping runs of the same source
//! apart when a vendor API answers slower than the tick. Startup is delayed
//! by a random jitter so several replicas do not hit the vendor APIs in
//! lockstep.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use metrics::histogram;
use rand::Rng;
use tokio::time::{Duration as TokioDuration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::import::{DataImportEvent, ImportEventDispatcher};
use crate::models::Manufacturer;
use crate::repositories::ThirdPartyApiConfigurationRepository;

type RunKey = (String, Manufacturer);

/// Background import scheduler.
pub struct ImportScheduler {
    configurations: ThirdPartyApiConfigurationRepository,
    dispatcher: Arc<ImportEventDispatcher>,
    running: Arc<Mutex<HashSet<RunKey>>>,
    tick_interval: TokioDuration,
    startup_jitter_max_seconds: u64,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct TickStats {
    scanned: u64,
    dispatched: u64,
    skipped_running: u64,
}

impl ImportScheduler {
    pub fn new(
        configurations: ThirdPartyApiConfigurationRepository,
        dispatcher: Arc<ImportEventDispatcher>,
        tick_interval_seconds: u64,
        startup_jitter_max_seconds: u64,
    ) -> Self {
        Self {
            configurations,
            dispatcher,
            running: Arc::new(Mutex::new(HashSet::new())),
            tick_interval: TokioDuration::from_secs(tick_interval_seconds.max(1)),
            startup_jitter_max_seconds,
        }
    }

    /// Run the scheduler loop until the provided shutdown token fires.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        let jitter = sample_startup_jitter_seconds(self.startup_jitter_max_seconds);
        info!(
            tick_interval_seconds = self.tick_interval.as_secs(),
            startup_jitter_seconds = jitter,
            "Starting import scheduler"
        );
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Import scheduler shutdown requested during startup jitter");
                return;
            }
            _ = sleep(TokioDuration::from_secs(jitter)) => {}
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Import scheduler shutdown requested");
                    break;
                }
                _ = sleep(self.tick_interval) => {
                    let tick_started = Instant::now();
                    match self.tick().await {
                        Ok(stats) => {
                            debug!(
                                scanned = stats.scanned,
                                dispatched = stats.dispatched,
                                skipped_running = stats.skipped_running,
                                "Scheduler tick completed"
                            );
                        }
                        Err(err) => error!(error = %err, "Scheduler tick failed"),
                    }
                    histogram!("import_scheduler_tick_duration_ms")
                        .record(tick_started.elapsed().as_secs_f64() * 1_000.0);
                }
            }
        }

        info!("Import scheduler stopped");
    }

    async fn tick(&self) -> Result<TickStats, crate::error::RepositoryError> {
        let mut stats = TickStats::default();

        for configuration in self.configurations.list_enabled()? {
            stats.scanned += 1;
            let key = (
                configuration.tenant_id.clone(),
                configuration.manufacturer,
            );
            if !try_begin(&self.running, &key) {
                stats.skipped_running += 1;
                debug!(
                    tenant_id = %key.0,
                    vendor = %key.1,
                    "skipping configuration, previous run still in flight"
                );
                continue;
            }
            stats.dispatched += 1;

            let dispatcher = Arc::clone(&self.dispatcher);
            let running = Arc::clone(&self.running);
            tokio::spawn(async move {
                let _release = scopeguard::guard(key, move |key| {
                    finish(&running, &key);
                });
                dispatcher.handle(DataImportEvent { configuration }).await;
            });
        }

        Ok(stats)
    }
}

/// Claims a running key. Returns false when a run for the key is already in
/// flight.
fn try_begin(running: &Mutex<HashSet<RunKey>>, key: &RunKey) -> bool {
    let mut running = running
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    running.insert(key.clone())
}

/// Releases a running key after the run finished, whatever way it ended.
fn finish(running: &Mutex<HashSet<RunKey>>, key: &RunKey) {
    let mut running = running
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    running.remove(key);
}

fn sample_startup_jitter_seconds(max_seconds: u64) -> u64 {
    let mut rng = rand::thread_rng();
    compute_startup_jitter_seconds(max_seconds, &mut rng)
}

fn compute_startup_jitter_seconds<R: Rng + ?Sized>(max_seconds: u64, rng: &mut R) -> u64 {
    if max_seconds == 0 {
        return 0;
    }
    rng.gen_range(0..=max_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiware::{
        EntityStore, StoreError, SubscriptionError, SubscriptionGateway,
    };
    use crate::import::{EntityPersister, ImportSettings, MeasurementImport};
    use crate::models::{
        DeviceMeasurement, EntityType, Group, Tenant, ThirdPartyApiConfiguration,
    };
    use crate::monitoring::JobMonitor;
    use crate::repositories::{
        ApplicationStore, GroupRepository, SubscriptionStatusRepository, TenantRepository,
    };
    use crate::subscriptions::SubscriptionService;
    use crate::vendors::registry::VendorRegistry;
    use crate::vendors::{DeviceSeries, FetchError, FetchWindow, VendorImport};
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::mock::StepRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn startup_jitter_respects_bounds() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let jitter = compute_startup_jitter_seconds(30, &mut rng);
            assert!(jitter <= 30);
        }
    }

    #[test]
    fn startup_jitter_is_zero_when_disabled() {
        let mut rng = StepRng::new(0, 1);
        assert_eq!(compute_startup_jitter_seconds(0, &mut rng), 0);
    }

    #[test]
    fn a_running_key_is_claimed_at_most_once() {
        let running = Mutex::new(HashSet::new());
        let key = ("farm1".to_string(), Manufacturer::SoilScout);

        assert!(try_begin(&running, &key));
        assert!(!try_begin(&running, &key), "second claim must be rejected");

        finish(&running, &key);
        assert!(try_begin(&running, &key), "released keys can be claimed again");
    }

    struct SlowVendor {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl VendorImport for SlowVendor {
        fn manufacturer(&self) -> Manufacturer {
            Manufacturer::SoilScout
        }

        async fn fetch(
            &self,
            _configuration: &ThirdPartyApiConfiguration,
            _window: &FetchWindow,
        ) -> Result<Vec<DeviceSeries>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            sleep(TokioDuration::from_millis(300)).await;
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

    struct NullGateway;

    #[async_trait]
    impl SubscriptionGateway for NullGateway {
        async fn subscribe(
            &self,
            _tenant: &Tenant,
            _entity_types: &[EntityType],
        ) -> Result<(), SubscriptionError> {
            Ok(())
        }
    }

    fn scheduler_fixture() -> (ImportScheduler, Arc<AtomicUsize>) {
        let app = Arc::new(ApplicationStore::in_memory());
        TenantRepository::new(Arc::clone(&app))
            .create("farm1", "Farm One", None)
            .unwrap();
        let configurations = ThirdPartyApiConfigurationRepository::new(Arc::clone(&app));
        configurations
            .create(ThirdPartyApiConfiguration::new(
                "farm1",
                Manufacturer::SoilScout,
                "https://api.example",
            ))
            .unwrap();

        let fetches = Arc::new(AtomicUsize::new(0));
        let mut registry = VendorRegistry::new();
        registry.register(Arc::new(SlowVendor {
            fetches: Arc::clone(&fetches),
        }));

        let subscriptions = Arc::new(SubscriptionService::new(
            Arc::new(NullGateway) as Arc<dyn SubscriptionGateway>,
            SubscriptionStatusRepository::new(Arc::clone(&app)),
            false,
        ));
        let import = MeasurementImport::new(
            EntityPersister::new(
                GroupRepository::new(Arc::clone(&app)),
                Arc::new(NullStore) as Arc<dyn EntityStore>,
            ),
            configurations.clone(),
            Arc::new(JobMonitor::new()),
            ImportSettings::default(),
        );
        let dispatcher = Arc::new(ImportEventDispatcher::new(
            TenantRepository::new(Arc::clone(&app)),
            subscriptions,
            Arc::new(registry),
            import,
        ));

        (
            ImportScheduler::new(configurations, dispatcher, 60, 0),
            fetches,
        )
    }

    #[tokio::test]
    async fn a_tick_does_not_redispatch_a_configuration_still_in_flight() {
        let (scheduler, _fetches) = scheduler_fixture();

        let first = scheduler.tick().await.unwrap();
        assert_eq!(
            first,
            TickStats {
                scanned: 1,
                dispatched: 1,
                skipped_running: 0
            }
        );

        // The spawned run sleeps inside fetch, so the key is still held.
        let second = scheduler.tick().await.unwrap();
        assert_eq!(
            second,
            TickStats {
                scanned: 1,
                dispatched: 0,
                skipped_running: 1
            }
        );
    }
}
