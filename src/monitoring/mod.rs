//! # Job Monitoring
//!
//! Per-vendor execution counters for the import pipeline: entities fetched,
//! errors during execution and the duration of the last run. One shared
//! instance is injected into every driver; counters are plain atomics so
//! concurrent runs never lose updates. Values are mirrored to the `metrics`
//! facade for external collection and reset only on restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{ALL_MANUFACTURERS, Manufacturer};

#[derive(Debug, Default)]
struct VendorCounters {
    entities_fetched: AtomicU64,
    errors: AtomicU64,
    /// f64 bit pattern of the last execution duration in seconds
    last_execution_seconds: AtomicU64,
}

/// Concurrency-safe per-vendor job counters.
///
/// The map is fully populated at construction for every known manufacturer
/// and never mutated afterwards, so lookups need no locking.
#[derive(Debug)]
pub struct JobMonitor {
    counters: HashMap<Manufacturer, VendorCounters>,
}

impl Default for JobMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl JobMonitor {
    pub fn new() -> Self {
        let counters = ALL_MANUFACTURERS
            .into_iter()
            .map(|manufacturer| (manufacturer, VendorCounters::default()))
            .collect();
        Self { counters }
    }

    fn vendor(&self, manufacturer: Manufacturer) -> &VendorCounters {
        // The map contains every Manufacturer variant by construction.
        &self.counters[&manufacturer]
    }

    /// Records how many records a fetch returned.
    pub fn log_nr_of_entities_fetched(&self, manufacturer: Manufacturer, count: u64) {
        self.vendor(manufacturer)
            .entities_fetched
            .fetch_add(count, Ordering::Relaxed);
        counter!("import_entities_fetched_total", "vendor" => manufacturer.as_str())
            .increment(count);
    }

    /// Records one error during a run, fetch-level or per-record.
    pub fn log_error_during_execution(&self, manufacturer: Manufacturer) {
        self.vendor(manufacturer).errors.fetch_add(1, Ordering::Relaxed);
        counter!("import_errors_total", "vendor" => manufacturer.as_str()).increment(1);
    }

    /// Records the wall-clock duration of a completed run.
    pub fn log_job_execution_time(&self, manufacturer: Manufacturer, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        self.vendor(manufacturer)
            .last_execution_seconds
            .store(seconds.to_bits(), Ordering::Relaxed);
        histogram!("import_duration_seconds", "vendor" => manufacturer.as_str()).record(seconds);
    }

    pub fn entities_fetched(&self, manufacturer: Manufacturer) -> u64 {
        self.vendor(manufacturer).entities_fetched.load(Ordering::Relaxed)
    }

    pub fn errors(&self, manufacturer: Manufacturer) -> u64 {
        self.vendor(manufacturer).errors.load(Ordering::Relaxed)
    }

    pub fn last_execution_seconds(&self, manufacturer: Manufacturer) -> f64 {
        f64::from_bits(
            self.vendor(manufacturer)
                .last_execution_seconds
                .load(Ordering::Relaxed),
        )
    }

    /// Snapshot of all counters, in manufacturer registration order.
    pub fn snapshot(&self) -> Vec<VendorJobStats> {
        ALL_MANUFACTURERS
            .into_iter()
            .map(|manufacturer| VendorJobStats {
                vendor: manufacturer,
                entities_fetched: self.entities_fetched(manufacturer),
                errors: self.errors(manufacturer),
                last_execution_seconds: self.last_execution_seconds(manufacturer),
            })
            .collect()
    }
}

/// Counter snapshot for one vendor, served by the info endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VendorJobStats {
    /// The vendor the counters belong to
    pub vendor: Manufacturer,
    /// Total number of records fetched since startup
    pub entities_fetched: u64,
    /// Total number of errors since startup
    pub errors: u64,
    /// Duration of the most recent run in seconds
    pub last_execution_seconds: f64,
}
