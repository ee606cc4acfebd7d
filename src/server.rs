//! # Server Configuration
//!
//! This module contains the server setup and wiring for the fieldbridge API
//! and the background import scheduler.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::fiware::ContextBrokerClient;
use crate::handlers;
use crate::import::{EntityPersister, ImportEventDispatcher, ImportSettings, MeasurementImport};
use crate::monitoring::JobMonitor;
use crate::repositories::{
    ApplicationStore, GroupRepository, SubscriptionStatusRepository, TenantRepository,
    ThirdPartyApiConfigurationRepository,
};
use crate::scheduler::ImportScheduler;
use crate::subscriptions::SubscriptionService;
use crate::telemetry;
use crate::vendors::{AgvolutionImport, Farm21Import, SoilScoutImport, VendorRegistry};

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub configurations: ThirdPartyApiConfigurationRepository,
    pub dispatcher: Arc<ImportEventDispatcher>,
    pub monitor: Arc<JobMonitor>,
    pub broker: Arc<ContextBrokerClient>,
}

/// Builds the full object graph behind the API: repositories on the shared
/// store, the broker client, and the import pipeline.
pub(crate) fn build_app_state(
    config: AppConfig,
    store: Arc<ApplicationStore>,
    registry: VendorRegistry,
    http: reqwest::Client,
) -> AppState {
    let config = Arc::new(config);

    let tenants = TenantRepository::new(store.clone());
    let groups = GroupRepository::new(store.clone());
    let configurations = ThirdPartyApiConfigurationRepository::new(store.clone());
    let subscription_status = SubscriptionStatusRepository::new(store.clone());

    let broker = Arc::new(ContextBrokerClient::new(http, &config.broker));
    let monitor = Arc::new(JobMonitor::new());

    let subscriptions = Arc::new(SubscriptionService::new(
        broker.clone(),
        subscription_status,
        config.broker.subscriptions_enabled,
    ));
    let persister = EntityPersister::new(groups, broker.clone());
    let import = MeasurementImport::new(
        persister,
        configurations.clone(),
        monitor.clone(),
        ImportSettings {
            days_in_the_past_for_initial_import: config.import.days_in_the_past_for_initial_import,
            window_overlap_seconds: config.import.window_overlap_seconds,
        },
    );
    let dispatcher = Arc::new(ImportEventDispatcher::new(
        tenants,
        subscriptions,
        Arc::new(registry),
        import,
    ));

    AppState {
        config,
        configurations,
        dispatcher,
        monitor,
        broker,
    }
}

/// Creates and configures the Axum application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/v1/info/broker", get(handlers::info::broker_info))
        .route("/api/v1/info/jobs", get(handlers::info::job_stats))
        .route(
            "/api/v1/import/{configuration_id}/run",
            post(handlers::import::run_import),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Starts the server with the given configuration
pub async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_tracing(&config)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.import.request_timeout_seconds))
        .build()?;

    let store = match &config.snapshot_path {
        Some(path) => Arc::new(ApplicationStore::with_snapshot(path)?),
        None => Arc::new(ApplicationStore::in_memory()),
    };

    let mut registry = VendorRegistry::new();
    registry.register(Arc::new(SoilScoutImport::new(http.clone())));
    registry.register(Arc::new(AgvolutionImport::new(http.clone())));
    registry.register(Arc::new(Farm21Import::new(http.clone())));

    let state = build_app_state(config, store, registry, http);

    let scheduler = ImportScheduler::new(
        state.configurations.clone(),
        state.dispatcher.clone(),
        state.config.import.tick_interval_seconds,
        state.config.import.startup_jitter_max_seconds,
    );
    let shutdown = CancellationToken::new();
    tokio::spawn(scheduler.run(shutdown.clone()));

    // Resolve the configured bind address
    let addr = state
        .config
        .bind_addr()
        .map_err(|e| format!("Invalid server address: {}", e))?;

    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on: {}", addr);
    println!("Running in profile: {}", profile);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C and cancels the scheduler so in-flight runs can wind
/// down while the listener drains.
async fn shutdown_signal(scheduler: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            println!("Shutting down");
            scheduler.cancel();
        }
        Err(err) => {
            error!(error = %err, "could not install the shutdown signal handler");
            std::future::pending::<()>().await;
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::health,
        crate::handlers::info::broker_info,
        crate::handlers::info::job_stats,
        crate::handlers::import::run_import,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::Manufacturer,
            crate::handlers::HealthStatus,
            crate::handlers::info::BrokerInfoResponse,
            crate::handlers::info::JobStatsResponse,
            crate::handlers::import::RunImportRequest,
            crate::handlers::import::RunImportResponse,
            crate::monitoring::VendorJobStats,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Fieldbridge API",
        description = "API for importing sensor data into an NGSI v2 context broker",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    fn test_app() -> Router {
        let store = Arc::new(ApplicationStore::in_memory());
        let state = build_app_state(
            AppConfig::default(),
            store,
            VendorRegistry::new(),
            reqwest::Client::new(),
        );
        create_app(state)
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn the_api_schema_is_served() {
        let app = test_app();

        let request = Request::builder()
            .method("GET")
            .uri("/openapi.json")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn manual_import_is_hidden_by_default() {
        let app = test_app();

        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/v1/import/{}/run", Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
