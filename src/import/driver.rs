//! Generic vendor import driver.
//!
//! Every vendor runs through the same sequence: resolve the mode, compute
//! the window, fetch, expand and persist each record, advance `last_run`.
//! Vendor specifics stay behind the `VendorImport` trait; the driver never
//! learns what a SoilScout or Farm21 payload looks like.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{error, info, instrument, warn};

use crate::models::{Tenant, ThirdPartyApiConfiguration};
use crate::monitoring::JobMonitor;
use crate::repositories::ThirdPartyApiConfigurationRepository;
use crate::vendors::VendorImport;

use super::{EntityPersister, ImportMode, ImportSettings};

pub struct MeasurementImport {
    persister: EntityPersister,
    configurations: ThirdPartyApiConfigurationRepository,
    monitor: Arc<JobMonitor>,
    settings: ImportSettings,
}

impl MeasurementImport {
    pub fn new(
        persister: EntityPersister,
        configurations: ThirdPartyApiConfigurationRepository,
        monitor: Arc<JobMonitor>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            persister,
            configurations,
            monitor,
            settings,
        }
    }

    /// Runs a scheduled import: initial when the configuration has never
    /// run before, incremental otherwise.
    pub async fn run(
        &self,
        driver: Arc<dyn VendorImport>,
        tenant: &Tenant,
        configuration: &ThirdPartyApiConfiguration,
    ) {
        let mode = ImportMode::resolve(configuration, None);
        self.execute(driver, tenant, configuration, mode).await;
    }

    /// Replays data from an explicit start. `last_run` stays untouched, so
    /// the next scheduled run continues where the last regular one ended.
    pub async fn run_historical(
        &self,
        driver: Arc<dyn VendorImport>,
        tenant: &Tenant,
        configuration: &ThirdPartyApiConfiguration,
        start: DateTime<Utc>,
    ) {
        self.execute(driver, tenant, configuration, ImportMode::Historical { start })
            .await;
    }

    #[instrument(
        skip(self, driver, tenant, configuration),
        fields(
            tenant_id = %tenant.tenant_id,
            vendor = %configuration.manufacturer,
            mode = mode.label(),
        )
    )]
    async fn execute(
        &self,
        driver: Arc<dyn VendorImport>,
        tenant: &Tenant,
        configuration: &ThirdPartyApiConfiguration,
        mode: ImportMode,
    ) {
        let manufacturer = driver.manufacturer();
        let begin = Instant::now();
        let window = mode.window(Utc::now(), &self.settings);
        info!("Starting import run for window {}", window);

        match driver.fetch(configuration, &window).await {
            Ok(series) => {
                self.monitor
                    .log_nr_of_entities_fetched(manufacturer, series.len() as u64);
                let mut persisted = 0usize;
                let mut failed = 0usize;
                for record in &series {
                    let candidates = driver.expand(record);
                    match self
                        .persister
                        .persist(tenant, &record.device_id, &candidates)
                        .await
                    {
                        Ok(report) => {
                            persisted += report.persisted;
                            failed += report.failed;
                            for _ in 0..report.failed {
                                self.monitor.log_error_during_execution(manufacturer);
                            }
                        }
                        Err(err) => {
                            warn!(
                                device_id = %record.device_id,
                                error = %err,
                                "skipping record, group resolution failed"
                            );
                            failed += candidates.len();
                            self.monitor.log_error_during_execution(manufacturer);
                        }
                    }
                }
                // Fetching succeeded, so the window is covered even if some
                // records could not be persisted. They are retried through
                // the overlap of the next incremental window.
                if mode.advances_last_run() {
                    if let Err(err) = self
                        .configurations
                        .update_last_run(configuration.id, window.until)
                    {
                        error!(error = %err, "failed to record the run's end");
                    }
                }
                info!(
                    records = series.len(),
                    persisted, failed, "Import run finished"
                );
            }
            Err(err) => {
                self.monitor.log_error_during_execution(manufacturer);
                error!(error = %err, "Import run aborted, nothing was fetched");
            }
        }

        self.monitor
            .log_job_execution_time(manufacturer, begin.elapsed());
    }
}
