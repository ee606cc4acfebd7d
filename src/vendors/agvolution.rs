//! Agvolution integration.
//!
//! Agvolution serves device timeseries through a GraphQL endpoint. One query
//! covers the whole window across all devices; each series entry carries the
//! device position and one timeseries per measured key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::models::{Manufacturer, ThirdPartyApiConfiguration};

use super::{DeviceSeries, FetchError, FetchWindow, Sample, VendorImport};

const DEVICE_TIMESERIES_QUERY: &str = "\
query DeviceTimeseries($start: DateTime!, $end: DateTime!) {
  deviceTimeseries(filter: { start: $start, end: $end }) {
    series {
      device
      longitude
      latitude
      timeseries {
        key
        unit
        values {
          time
          value
        }
      }
    }
  }
}";

/// Import driver for the Agvolution climate sensor network.
pub struct AgvolutionImport {
    http: reqwest::Client,
}

impl AgvolutionImport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl VendorImport for AgvolutionImport {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::Agvolution
    }

    async fn fetch(
        &self,
        configuration: &ThirdPartyApiConfiguration,
        window: &FetchWindow,
    ) -> Result<Vec<DeviceSeries>, FetchError> {
        let token = configuration
            .api_token
            .as_deref()
            .ok_or(FetchError::MissingCredentials("api_token"))?;

        let response = self
            .http
            .post(format!("{}/graphql", configuration.url))
            .bearer_auth(token)
            .json(&json!({
                "query": DEVICE_TIMESERIES_QUERY,
                "variables": {
                    "start": window.since.to_rfc3339(),
                    "end": window.until.to_rfc3339(),
                },
            }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(FetchError::Authentication(
                    "Agvolution rejected the API token".to_string(),
                ));
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                return Err(FetchError::Http {
                    status: status.as_u16(),
                    body,
                });
            }
        }

        let envelope: GraphQlResponse = response
            .json()
            .await
            .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;

        if let Some(errors) = envelope.errors
            && !errors.is_empty()
        {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::Rejected(messages.join("; ")));
        }

        let data = envelope
            .data
            .ok_or_else(|| FetchError::MalformedResponse("response carries no data".to_string()))?;
        Ok(data
            .device_timeseries
            .series
            .iter()
            .map(series_from)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<DeviceData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DeviceData {
    #[serde(rename = "deviceTimeseries")]
    device_timeseries: DeviceTimeseries,
}

#[derive(Debug, Deserialize)]
struct DeviceTimeseries {
    series: Vec<SeriesEntry>,
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    device: String,
    longitude: f64,
    latitude: f64,
    timeseries: Vec<Timeseries>,
}

#[derive(Debug, Deserialize)]
struct Timeseries {
    key: String,
    #[allow(dead_code)]
    unit: Option<String>,
    values: Vec<TimeseriesValue>,
}

#[derive(Debug, Deserialize)]
struct TimeseriesValue {
    time: DateTime<Utc>,
    value: f64,
}

fn series_from(entry: &SeriesEntry) -> DeviceSeries {
    let samples = entry
        .timeseries
        .iter()
        .flat_map(|timeseries| {
            timeseries.values.iter().map(|point| Sample {
                channel: timeseries.key.clone(),
                value: point.value,
                measured_at: point.time,
            })
        })
        .collect();
    DeviceSeries {
        device_id: entry.device.clone(),
        latitude: entry.latitude,
        longitude: entry.longitude,
        samples,
    }
}
