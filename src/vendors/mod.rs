//! # Vendor Integrations
//!
//! Defines the capability interface every vendor import implementation
//! follows, the common record shape fetches return, and the registry the
//! dispatcher routes through. One driver (`crate::import`) runs all vendors;
//! the implementations here only know how to fetch and expand their own data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{EntityType, Manufacturer, ThirdPartyApiConfiguration};

pub mod agvolution;
pub mod farm21;
pub mod registry;
pub mod soilscout;

pub use agvolution::AgvolutionImport;
pub use farm21::Farm21Import;
pub use registry::{RegistryError, VendorRegistry};
pub use soilscout::SoilScoutImport;

/// Half-open fetch window `[since, until)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl FetchWindow {
    /// An empty window fetches nothing; produced when a clock-skewed
    /// `last_run` would otherwise invert the window.
    pub fn is_empty(&self) -> bool {
        self.since >= self.until
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.since.to_rfc3339(),
            self.until.to_rfc3339()
        )
    }
}

/// One measured value of one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Channel name, e.g. `temperature`
    pub channel: String,
    pub value: f64,
    pub measured_at: DateTime<Utc>,
}

/// Everything a fetch returned for one device: its identity, position and
/// the samples inside the window. This is the vendor-neutral record the
/// generic driver iterates over.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSeries {
    /// Vendor-side device identifier, not yet tenant-prefixed
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub samples: Vec<Sample>,
}

/// A per-channel measurement expanded from a device series, still missing
/// the tenant prefix and group reference the mapper adds.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementCandidate {
    pub device_id: String,
    pub entity_type: EntityType,
    pub channel: String,
    pub value: f64,
    pub measured_at: DateTime<Utc>,
    /// Optional reference to external payload data
    pub external_data_reference: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Errors a vendor fetch can fail with. Any of these aborts the run; the
/// next scheduled trigger retries the same window.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication against the vendor API failed: {0}")]
    Authentication(String),
    #[error("vendor API returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error while calling the vendor API: {0}")]
    Network(String),
    #[error("malformed vendor response: {0}")]
    MalformedResponse(String),
    #[error("vendor API rejected the request: {0}")]
    Rejected(String),
    #[error("configuration is missing the {0} credential")]
    MissingCredentials(&'static str),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

/// Capability interface of one vendor integration.
///
/// `fetch` talks to the vendor API and normalizes its wire format into
/// device series; `expand` turns one series into per-channel measurement
/// candidates. The provided `expand` emits one candidate per sample, which
/// every current vendor uses unchanged.
#[async_trait]
pub trait VendorImport: Send + Sync {
    /// Vendor identity used for registry lookup, logging and metrics.
    fn manufacturer(&self) -> Manufacturer;

    /// Entity type this vendor's measurements are published under.
    fn entity_type(&self) -> EntityType {
        self.manufacturer().entity_type()
    }

    /// Fetches all device series with samples inside the window.
    async fn fetch(
        &self,
        configuration: &ThirdPartyApiConfiguration,
        window: &FetchWindow,
    ) -> Result<Vec<DeviceSeries>, FetchError>;

    /// Expands one fetched series into per-channel measurement candidates.
    fn expand(&self, series: &DeviceSeries) -> Vec<MeasurementCandidate> {
        series
            .samples
            .iter()
            .map(|sample| MeasurementCandidate {
                device_id: series.device_id.clone(),
                entity_type: self.entity_type(),
                channel: sample.channel.clone(),
                value: sample.value,
                measured_at: sample.measured_at,
                external_data_reference: None,
                latitude: series.latitude,
                longitude: series.longitude,
            })
            .collect()
    }
}

/// Window boundary format shared by the REST vendor APIs.
pub(crate) fn format_window_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct StubVendor;

    #[async_trait]
    impl VendorImport for StubVendor {
        fn manufacturer(&self) -> Manufacturer {
            Manufacturer::SoilScout
        }

        async fn fetch(
            &self,
            _configuration: &ThirdPartyApiConfiguration,
            _window: &FetchWindow,
        ) -> Result<Vec<DeviceSeries>, FetchError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn default_expand_emits_one_candidate_per_sample() {
        let measured_at = Utc.with_ymd_and_hms(2024, 4, 2, 8, 0, 0).unwrap();
        let series = DeviceSeries {
            device_id: "77".to_string(),
            latitude: 52.1,
            longitude: 13.2,
            samples: vec![
                Sample {
                    channel: "temperature".to_string(),
                    value: 19.5,
                    measured_at,
                },
                Sample {
                    channel: "moisture".to_string(),
                    value: 31.0,
                    measured_at,
                },
            ],
        };

        let candidates = StubVendor.expand(&series);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.device_id == "77"));
        assert!(
            candidates
                .iter()
                .all(|c| c.entity_type == EntityType::SoilScoutSensor)
        );
        assert_eq!(candidates[0].channel, "temperature");
        assert_eq!(candidates[1].channel, "moisture");
    }

    #[test]
    fn window_timestamps_use_minute_precision() {
        let timestamp = Utc.with_ymd_and_hms(2024, 4, 2, 8, 30, 45).unwrap();
        assert_eq!(format_window_timestamp(timestamp), "2024-04-02 08:30");
    }

    #[test]
    fn inverted_windows_are_empty() {
        let now = Utc::now();
        let window = FetchWindow {
            since: now,
            until: now,
        };
        assert!(window.is_empty());
    }
}
