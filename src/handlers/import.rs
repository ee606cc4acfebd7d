//! # Import API Handlers
//!
//! Manual trigger for a single configuration's import run. The route only
//! exists when `FIELDBRIDGE_MANUAL_IMPORT_ALLOWED` is set; otherwise it
//! answers 404 like any unknown path.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, not_found, validation_error};
use crate::import::{DataImportEvent, ImportMode};
use crate::models::Manufacturer;
use crate::server::AppState;

/// Request payload for the manual import trigger
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RunImportRequest {
    /// Replay data from this point in time instead of running the regular
    /// schedule (RFC 3339)
    #[schema(example = "2024-05-01T00:00:00Z")]
    pub start: Option<String>,
}

/// Response payload for an accepted import run
#[derive(Debug, Serialize, ToSchema)]
pub struct RunImportResponse {
    /// The configuration the run was started for
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub configuration_id: Uuid,
    /// The vendor the configuration imports from
    pub vendor: Manufacturer,
    /// How the run selects its window
    #[schema(example = "incremental")]
    pub mode: String,
}

/// Trigger an import run for one configuration
#[utoipa::path(
    post,
    path = "/api/v1/import/{configuration_id}/run",
    params(
        ("configuration_id" = Uuid, Path, description = "Configuration to run the import for")
    ),
    request_body(content = Option<RunImportRequest>, description = "Optional replay start", content_type = "application/json"),
    responses(
        (status = 202, description = "Import run accepted", body = RunImportResponse, example = json!({
            "configuration_id": "550e8400-e29b-41d4-a716-446655440000",
            "vendor": "soilscout",
            "mode": "historical"
        })),
        (status = 400, description = "Malformed request body or start timestamp", body = ApiError),
        (status = 404, description = "Unknown configuration, or manual imports are disabled", body = ApiError)
    ),
    tag = "import"
)]
pub async fn run_import(
    State(state): State<AppState>,
    Path(configuration_id): Path<Uuid>,
    payload: Result<Option<Json<RunImportRequest>>, JsonRejection>,
) -> Result<(StatusCode, Json<RunImportResponse>), ApiError> {
    if !state.config.import.manual_import_allowed {
        return Err(not_found("The requested resource was not found"));
    }

    let request = payload?.map(|Json(request)| request).unwrap_or_default();
    let start = request.start.as_deref().map(parse_start).transpose()?;

    let configuration = state
        .configurations
        .get(configuration_id)?
        .ok_or_else(|| not_found("No such import configuration"))?;

    let mode = ImportMode::resolve(&configuration, start);
    let response = RunImportResponse {
        configuration_id,
        vendor: configuration.manufacturer,
        mode: mode.label().to_string(),
    };

    // The run happens in the background; the response only confirms that it
    // was started.
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let event = DataImportEvent { configuration };
        match start {
            Some(start) => dispatcher.handle_historical(event, start).await,
            None => dispatcher.handle(event).await,
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

fn parse_start(start: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(start)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            validation_error(
                "Invalid start format",
                serde_json::json!({
                    "start": "Must be a valid ISO 8601 timestamp (RFC 3339)"
                }),
            )
        })
}
