//! # Info API Handlers
//!
//! Read-only endpoints exposing the context broker's reachability and the
//! per-vendor counters of the import jobs.

use axum::{extract::State, response::Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, broker_unreachable};
use crate::fiware::StoreError;
use crate::monitoring::VendorJobStats;
use crate::server::AppState;

/// Context broker probe response
#[derive(Debug, Serialize, ToSchema)]
pub struct BrokerInfoResponse {
    /// Version string reported by the broker, if it exposes one
    #[schema(example = "3.10.1")]
    pub version: Option<String>,
}

/// Per-vendor counters of the import jobs
#[derive(Debug, Serialize, ToSchema)]
pub struct JobStatsResponse {
    /// One entry per known vendor
    pub vendors: Vec<VendorJobStats>,
}

/// Probe the context broker and report its version
#[utoipa::path(
    get,
    path = "/api/v1/info/broker",
    responses(
        (status = 200, description = "The context broker answered the version probe", body = BrokerInfoResponse, example = json!({
            "version": "3.10.1"
        })),
        (status = 502, description = "The context broker is unreachable", body = ApiError)
    ),
    tag = "info"
)]
pub async fn broker_info(
    State(state): State<AppState>,
) -> Result<Json<BrokerInfoResponse>, ApiError> {
    let status = state.broker.version().await.map_err(|err| match err {
        StoreError::Http { status, body } => broker_unreachable(Some(status), Some(body)),
        StoreError::Network(message) => broker_unreachable(None, Some(message)),
    })?;

    Ok(Json(BrokerInfoResponse {
        version: status.version,
    }))
}

/// List the import job counters of every vendor
#[utoipa::path(
    get,
    path = "/api/v1/info/jobs",
    responses(
        (status = 200, description = "Counters of the import jobs per vendor", body = JobStatsResponse, example = json!({
            "vendors": [
                {
                    "vendor": "soilscout",
                    "entities_fetched": 128,
                    "errors": 0,
                    "last_execution_seconds": 1.42
                }
            ]
        }))
    ),
    tag = "info"
)]
pub async fn job_stats(State(state): State<AppState>) -> Json<JobStatsResponse> {
    Json(JobStatsResponse {
        vendors: state.monitor.snapshot(),
    })
}
