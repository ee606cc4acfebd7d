//! Soil Scout integration.
//!
//! Soil Scout exposes a credential login that returns a short-lived bearer
//! token, and a measurement endpoint filtered by a since/until window. Every
//! measurement document carries the full device with its position, so one
//! document becomes one device series with five channels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::models::{Manufacturer, ThirdPartyApiConfiguration};

use super::{DeviceSeries, FetchError, FetchWindow, Sample, VendorImport, format_window_timestamp};

/// Import driver for Soil Scout buried sensors.
pub struct SoilScoutImport {
    http: reqwest::Client,
}

impl SoilScoutImport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn login(
        &self,
        configuration: &ThirdPartyApiConfiguration,
    ) -> Result<String, FetchError> {
        let username = configuration
            .username
            .as_deref()
            .ok_or(FetchError::MissingCredentials("username"))?;
        let password = configuration
            .password
            .as_deref()
            .ok_or(FetchError::MissingCredentials("password"))?;

        let response = self
            .http
            .post(format!("{}/auth/login/", configuration.url))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let login: LoginResponse = response
                    .json()
                    .await
                    .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;
                Ok(login.access)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Authentication(
                "Soil Scout login rejected the credentials".to_string(),
            )),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(FetchError::Http {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl VendorImport for SoilScoutImport {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::SoilScout
    }

    async fn fetch(
        &self,
        configuration: &ThirdPartyApiConfiguration,
        window: &FetchWindow,
    ) -> Result<Vec<DeviceSeries>, FetchError> {
        let token = self.login(configuration).await?;

        let response = self
            .http
            .get(format!("{}/data/", configuration.url))
            .bearer_auth(token)
            .query(&[
                ("since", format_window_timestamp(window.since)),
                ("until", format_window_timestamp(window.until)),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Http { status, body });
        }

        let measurements: Vec<SoilScoutMeasurement> = response
            .json()
            .await
            .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;
        Ok(measurements.iter().map(series_from).collect())
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
}

#[derive(Debug, Deserialize)]
struct SoilScoutMeasurement {
    device: SoilScoutDevice,
    timestamp: DateTime<Utc>,
    temperature: f64,
    moisture: f64,
    conductivity: f64,
    salinity: f64,
    water_balance: f64,
}

#[derive(Debug, Deserialize)]
struct SoilScoutDevice {
    id: i64,
    location: SoilScoutLocation,
}

#[derive(Debug, Deserialize)]
struct SoilScoutLocation {
    latitude: f64,
    longitude: f64,
}

fn series_from(measurement: &SoilScoutMeasurement) -> DeviceSeries {
    let channels = [
        ("temperature", measurement.temperature),
        ("moisture", measurement.moisture),
        ("conductivity", measurement.conductivity),
        ("salinity", measurement.salinity),
        ("waterBalance", measurement.water_balance),
    ];
    DeviceSeries {
        device_id: measurement.device.id.to_string(),
        latitude: measurement.device.location.latitude,
        longitude: measurement.device.location.longitude,
        samples: channels
            .into_iter()
            .map(|(channel, value)| Sample {
                channel: channel.to_string(),
                value,
                measured_at: measurement.timestamp,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_measurement_document_expands_into_five_channels() {
        let measurement: SoilScoutMeasurement = serde_json::from_value(serde_json::json!({
            "device": {
                "id": 4810,
                "location": {"latitude": 61.45, "longitude": 23.85}
            },
            "timestamp": "2024-04-02T08:30:00Z",
            "temperature": 12.3,
            "moisture": 28.9,
            "conductivity": 0.41,
            "salinity": 0.12,
            "water_balance": 0.73
        }))
        .expect("sample document should deserialize");

        let series = series_from(&measurement);
        assert_eq!(series.device_id, "4810");
        assert_eq!(series.samples.len(), 5);
        let channels: Vec<&str> = series.samples.iter().map(|s| s.channel.as_str()).collect();
        assert_eq!(
            channels,
            vec![
                "temperature",
                "moisture",
                "conductivity",
                "salinity",
                "waterBalance"
            ]
        );
        assert!(series.samples.iter().all(|s| s.measured_at == measurement.timestamp));
    }
}
