//! # Import Pipeline
//!
//! The orchestration core: one generic driver runs every vendor through the
//! same fetch, expand and persist sequence, the dispatcher routes import
//! events to it, and the mapper turns vendor records into tenant-scoped
//! broker entities. Failure isolation levels, from widest to narrowest:
//! a missing tenant drops the event, a fetch error aborts the run, a record
//! or entity error only skips that record or entity.

pub mod dispatcher;
pub mod driver;
pub mod mapper;
pub mod mode;

pub use dispatcher::{DataImportEvent, ImportEventDispatcher};
pub use driver::MeasurementImport;
pub use mapper::{EntityPersister, PersistReport};
pub use mode::ImportMode;

/// Window tuning for import runs.
#[derive(Debug, Clone)]
pub struct ImportSettings {
    /// Days of history an initial import covers
    pub days_in_the_past_for_initial_import: i64,
    /// Seconds an incremental window reaches back before `last_run`, so
    /// records that failed at the end of the previous run are retried
    pub window_overlap_seconds: i64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            days_in_the_past_for_initial_import: 30,
            window_overlap_seconds: 300,
        }
    }
}
