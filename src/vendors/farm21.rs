//! Farm21 integration.
//!
//! Farm21 has no windowed bulk endpoint: the sensor list is fetched first,
//! then the data of every sensor separately. A server error on a single
//! sensor skips that sensor and keeps the rest of the fleet importable; only
//! authentication failures abort the whole fetch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::models::{Manufacturer, ThirdPartyApiConfiguration};

use super::{DeviceSeries, FetchError, FetchWindow, Sample, VendorImport, format_window_timestamp};

/// Data channels requested from the Farm21 API.
const SENSOR_DATA_FIELDS: [&str; 6] = [
    "soil_moisture_10",
    "soil_moisture_20",
    "soil_moisture_30",
    "temp_pos_10",
    "humidity",
    "battery",
];

/// Import driver for Farm21 soil moisture probes.
pub struct Farm21Import {
    http: reqwest::Client,
}

impl Farm21Import {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch_sensors(
        &self,
        configuration: &ThirdPartyApiConfiguration,
        token: &str,
    ) -> Result<Vec<Farm21Sensor>, FetchError> {
        let response = self
            .http
            .get(format!("{}/sensors", configuration.url))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|err| FetchError::MalformedResponse(err.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::Authentication(
                "Farm21 rejected the API token".to_string(),
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

    /// Fetches one sensor's data. Server-side errors yield an empty list so
    /// one broken sensor does not abort the fleet.
    async fn fetch_sensor_data(
        &self,
        configuration: &ThirdPartyApiConfiguration,
        token: &str,
        sensor_id: i64,
        window: &FetchWindow,
    ) -> Result<Vec<Farm21SensorData>, FetchError> {
        let mut query: Vec<(&str, String)> = vec![
            ("start_date", format_window_timestamp(window.since)),
            ("end_date", format_window_timestamp(window.until)),
        ];
        for field in SENSOR_DATA_FIELDS {
            query.push(("sensor_data[]", field.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/sensors/{}/data", configuration.url, sensor_id))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let data: SensorDataResponse = response
                .json()
                .await
                .map_err(|err| FetchError::MalformedResponse(err.to_string()))?;
            Ok(data.sensor_data)
        } else if status.is_server_error() {
            warn!(sensor_id, status = status.as_u16(), "skipping sensor after server error");
            Ok(Vec::new())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(FetchError::Authentication(
                "Farm21 rejected the API token".to_string(),
            ))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::Http {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl VendorImport for Farm21Import {
    fn manufacturer(&self) -> Manufacturer {
        Manufacturer::Farm21
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

        let sensors = self.fetch_sensors(configuration, token).await?;
        let mut series = Vec::with_capacity(sensors.len());
        for sensor in sensors {
            let data = self
                .fetch_sensor_data(configuration, token, sensor.id, window)
                .await?;
            if data.is_empty() {
                continue;
            }
            series.push(series_from(&sensor, &data));
        }
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct Farm21Sensor {
    id: i64,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct SensorDataResponse {
    sensor_data: Vec<Farm21SensorData>,
}

#[derive(Debug, Deserialize)]
struct Farm21SensorData {
    measured_at: DateTime<Utc>,
    soil_moisture_10: Option<f64>,
    soil_moisture_20: Option<f64>,
    soil_moisture_30: Option<f64>,
    temp_pos_10: Option<f64>,
    humidity: Option<f64>,
    battery: Option<f64>,
}

fn series_from(sensor: &Farm21Sensor, data: &[Farm21SensorData]) -> DeviceSeries {
    let mut samples = Vec::new();
    for point in data {
        let channels = [
            ("soilMoisture10", point.soil_moisture_10),
            ("soilMoisture20", point.soil_moisture_20),
            ("soilMoisture30", point.soil_moisture_30),
            ("temperature", point.temp_pos_10),
            ("humidity", point.humidity),
            ("battery", point.battery),
        ];
        for (channel, value) in channels {
            if let Some(value) = value {
                samples.push(Sample {
                    channel: channel.to_string(),
                    value,
                    measured_at: point.measured_at,
                });
            }
        }
    }
    DeviceSeries {
        device_id: sensor.id.to_string(),
        latitude: sensor.latitude,
        longitude: sensor.longitude,
        samples,
    }
}
