//! Import mode and window computation.

use chrono::{DateTime, Duration, Utc};

use crate::models::ThirdPartyApiConfiguration;
use crate::vendors::FetchWindow;

use super::ImportSettings;

/// How a run selects its fetch window. Resolved exactly once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// First run for a configuration: backfill a configured number of days.
    Initial,
    /// Regular scheduled run: continue where the last one ended, reaching
    /// back by the overlap.
    Incremental { last_run: DateTime<Utc> },
    /// Operator-triggered replay from an explicit start, independent of
    /// `last_run`.
    Historical { start: DateTime<Utc> },
}

impl ImportMode {
    /// Resolves the mode from the configuration and an optional
    /// operator-supplied start.
    pub fn resolve(
        configuration: &ThirdPartyApiConfiguration,
        explicit_start: Option<DateTime<Utc>>,
    ) -> Self {
        if let Some(start) = explicit_start {
            return ImportMode::Historical { start };
        }
        match configuration.last_run {
            Some(last_run) => ImportMode::Incremental { last_run },
            None => ImportMode::Initial,
        }
    }

    /// Computes the half-open fetch window ending at `now`. A `since` that
    /// would lie in the future (clock-skewed `last_run`) clamps to an empty
    /// window instead of inverting.
    pub fn window(&self, now: DateTime<Utc>, settings: &ImportSettings) -> FetchWindow {
        let since = match self {
            ImportMode::Initial => {
                now - Duration::days(settings.days_in_the_past_for_initial_import)
            }
            ImportMode::Incremental { last_run } => {
                *last_run - Duration::seconds(settings.window_overlap_seconds)
            }
            ImportMode::Historical { start } => *start,
        };
        FetchWindow {
            since: since.min(now),
            until: now,
        }
    }

    /// Whether a successful run advances the configuration's `last_run`.
    /// Historical replays never do.
    pub fn advances_last_run(&self) -> bool {
        !matches!(self, ImportMode::Historical { .. })
    }

    /// Stable label for logs and spans.
    pub fn label(&self) -> &'static str {
        match self {
            ImportMode::Initial => "initial",
            ImportMode::Incremental { .. } => "incremental",
            ImportMode::Historical { .. } => "historical",
        }
    }
}
