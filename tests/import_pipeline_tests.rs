//! Integration tests for the import pipeline: a Soil Scout API stub on one
//! side, a context broker stub on the other, the real dispatcher in between.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fieldbridge::config::BrokerConfig;
use fieldbridge::fiware::ContextBrokerClient;
use fieldbridge::import::{
    DataImportEvent, EntityPersister, ImportEventDispatcher, ImportSettings, MeasurementImport,
};
use fieldbridge::models::{Manufacturer, ThirdPartyApiConfiguration};
use fieldbridge::monitoring::JobMonitor;
use fieldbridge::repositories::{
    ApplicationStore, GroupRepository, SubscriptionStatusRepository, TenantRepository,
    ThirdPartyApiConfigurationRepository,
};
use fieldbridge::subscriptions::SubscriptionService;
use fieldbridge::vendors::{SoilScoutImport, VendorRegistry};

struct Pipeline {
    dispatcher: ImportEventDispatcher,
    configurations: ThirdPartyApiConfigurationRepository,
    monitor: Arc<JobMonitor>,
}

fn pipeline(store: Arc<ApplicationStore>, broker_url: &str) -> Pipeline {
    let http = reqwest::Client::new();
    let broker_config = BrokerConfig {
        url: broker_url.to_string(),
        notification_url: "http://fieldbridge.internal:8668/v2/notify".to_string(),
        subscriptions_enabled: true,
    };
    let broker = Arc::new(ContextBrokerClient::new(http.clone(), &broker_config));

    let monitor = Arc::new(JobMonitor::new());
    let subscriptions = Arc::new(SubscriptionService::new(
        broker.clone(),
        SubscriptionStatusRepository::new(store.clone()),
        true,
    ));
    let configurations = ThirdPartyApiConfigurationRepository::new(store.clone());
    let persister = EntityPersister::new(GroupRepository::new(store.clone()), broker.clone());
    let import = MeasurementImport::new(
        persister,
        configurations.clone(),
        monitor.clone(),
        ImportSettings::default(),
    );

    let mut registry = VendorRegistry::new();
    registry.register(Arc::new(SoilScoutImport::new(http)));

    let dispatcher = ImportEventDispatcher::new(
        TenantRepository::new(store.clone()),
        subscriptions,
        Arc::new(registry),
        import,
    );

    Pipeline {
        dispatcher,
        configurations,
        monitor,
    }
}

fn seed(store: &Arc<ApplicationStore>, vendor_url: &str) -> ThirdPartyApiConfiguration {
    TenantRepository::new(store.clone())
        .create("farm1", "Farm One", None)
        .expect("tenant");
    let mut configuration =
        ThirdPartyApiConfiguration::new("farm1", Manufacturer::SoilScout, vendor_url);
    configuration.username = Some("importer".to_string());
    configuration.password = Some("secret".to_string());
    ThirdPartyApiConfigurationRepository::new(store.clone())
        .create(configuration)
        .expect("configuration")
}

fn soilscout_document() -> Value {
    json!({
        "device": {"id": 4810, "location": {"latitude": 61.45, "longitude": 23.85}},
        "timestamp": "2024-04-02T08:30:00Z",
        "temperature": 12.3,
        "moisture": 28.9,
        "conductivity": 0.41,
        "salinity": 0.12,
        "water_balance": 0.73
    })
}

async fn mount_soilscout(vendor: &MockServer, documents: Value) {
    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access": "token-1", "refresh": "token-2"})),
        )
        .mount(vendor)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(documents))
        .mount(vendor)
        .await;
}

#[tokio::test]
async fn a_full_run_pushes_prefixed_entities_and_advances_last_run() {
    let vendor = MockServer::start().await;
    let broker = MockServer::start().await;
    mount_soilscout(&vendor, json!([soilscout_document()])).await;

    Mock::given(method("POST"))
        .and(path("/v2/subscriptions"))
        .and(header("Fiware-Service", "farm1"))
        .and(header("Fiware-ServicePath", "/#"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&broker)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/op/update"))
        .and(header("Fiware-Service", "farm1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(5)
        .mount(&broker)
        .await;

    let store = Arc::new(ApplicationStore::in_memory());
    let configuration = seed(&store, &vendor.uri());
    let pipeline = pipeline(store, &broker.uri());

    let before = Utc::now();
    pipeline
        .dispatcher
        .handle(DataImportEvent {
            configuration: configuration.clone(),
        })
        .await;

    // One append per channel, every entity id carries the tenant prefix.
    let appends: Vec<_> = broker
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/v2/op/update")
        .collect();
    assert_eq!(appends.len(), 5);
    let body: Value = serde_json::from_slice(&appends[0].body).unwrap();
    assert_eq!(body["actionType"], "append");
    assert_eq!(body["entities"][0]["id"], "urn:farm1:4810");
    assert_eq!(body["entities"][0]["type"], "SoilScoutSensor");

    // The fetch succeeded, so the run advanced the configuration's history.
    let last_run = pipeline
        .configurations
        .get(configuration.id)
        .unwrap()
        .unwrap()
        .last_run
        .expect("a successful run advances last_run");
    assert!(last_run >= before && last_run <= Utc::now());

    assert_eq!(pipeline.monitor.entities_fetched(Manufacturer::SoilScout), 1);
    assert_eq!(pipeline.monitor.errors(Manufacturer::SoilScout), 0);
}

#[tokio::test]
async fn the_subscription_is_registered_once_and_covers_every_entity_type() {
    let vendor = MockServer::start().await;
    let broker = MockServer::start().await;
    mount_soilscout(&vendor, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/v2/subscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&broker)
        .await;

    let store = Arc::new(ApplicationStore::in_memory());
    let configuration = seed(&store, &vendor.uri());
    let pipeline = pipeline(store, &broker.uri());

    pipeline
        .dispatcher
        .handle(DataImportEvent {
            configuration: configuration.clone(),
        })
        .await;
    pipeline
        .dispatcher
        .handle(DataImportEvent { configuration })
        .await;

    let subscriptions: Vec<_> = broker
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/v2/subscriptions")
        .collect();
    assert_eq!(subscriptions.len(), 1);

    let body: Value = serde_json::from_slice(&subscriptions[0].body).unwrap();
    assert_eq!(body["subject"]["entities"].as_array().map(Vec::len), Some(3));
    assert_eq!(body["subject"]["condition"]["attrs"], json!(["numValue"]));
    assert_eq!(
        body["notification"]["http"]["url"],
        "http://fieldbridge.internal:8668/v2/notify"
    );
}

#[tokio::test]
async fn a_fetch_failure_leaves_the_run_history_untouched() {
    let vendor = MockServer::start().await;
    let broker = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("login exploded"))
        .mount(&vendor)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/subscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&broker)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/op/update"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&broker)
        .await;

    let store = Arc::new(ApplicationStore::in_memory());
    let configuration = seed(&store, &vendor.uri());
    let pipeline = pipeline(store, &broker.uri());

    pipeline
        .dispatcher
        .handle(DataImportEvent {
            configuration: configuration.clone(),
        })
        .await;

    let stored = pipeline
        .configurations
        .get(configuration.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_run, None);
    assert_eq!(pipeline.monitor.errors(Manufacturer::SoilScout), 1);
    assert_eq!(pipeline.monitor.entities_fetched(Manufacturer::SoilScout), 0);
}

#[tokio::test]
async fn broker_rejections_do_not_abort_the_run() {
    let vendor = MockServer::start().await;
    let broker = MockServer::start().await;
    mount_soilscout(&vendor, json!([soilscout_document()])).await;

    Mock::given(method("POST"))
        .and(path("/v2/subscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&broker)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/op/update"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Unprocessable Entity"))
        .mount(&broker)
        .await;

    let store = Arc::new(ApplicationStore::in_memory());
    let configuration = seed(&store, &vendor.uri());
    let pipeline = pipeline(store, &broker.uri());

    pipeline
        .dispatcher
        .handle(DataImportEvent {
            configuration: configuration.clone(),
        })
        .await;

    // Every append was rejected, yet the window counts as covered; the
    // rejected entities are retried through the overlap of the next window.
    let stored = pipeline
        .configurations
        .get(configuration.id)
        .unwrap()
        .unwrap();
    assert!(stored.last_run.is_some());
    assert_eq!(pipeline.monitor.errors(Manufacturer::SoilScout), 5);
}

#[tokio::test]
async fn a_failed_subscription_is_retried_on_the_next_event() {
    let vendor = MockServer::start().await;
    let broker = MockServer::start().await;
    mount_soilscout(&vendor, json!([])).await;

    Mock::given(method("POST"))
        .and(path("/v2/subscriptions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("broker hiccup"))
        .mount(&broker)
        .await;

    let store = Arc::new(ApplicationStore::in_memory());
    let configuration = seed(&store, &vendor.uri());
    let pipeline = pipeline(store, &broker.uri());

    pipeline
        .dispatcher
        .handle(DataImportEvent {
            configuration: configuration.clone(),
        })
        .await;
    pipeline
        .dispatcher
        .handle(DataImportEvent {
            configuration: configuration.clone(),
        })
        .await;

    // The flag only flips after a successful registration, so both events
    // attempted one. The import itself kept running regardless.
    let subscriptions = broker
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/v2/subscriptions")
        .count();
    assert_eq!(subscriptions, 2);
    assert!(
        pipeline
            .configurations
            .get(configuration.id)
            .unwrap()
            .unwrap()
            .last_run
            .is_some()
    );
}

#[tokio::test]
async fn assigned_sensors_are_published_under_their_groups_service_path() {
    let vendor = MockServer::start().await;
    let broker = MockServer::start().await;
    mount_soilscout(&vendor, json!([soilscout_document()])).await;

    Mock::given(method("POST"))
        .and(path("/v2/subscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&broker)
        .await;
    Mock::given(method("POST"))
        .and(path("/v2/op/update"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&broker)
        .await;

    let store = Arc::new(ApplicationStore::in_memory());
    let configuration = seed(&store, &vendor.uri());
    let groups = GroupRepository::new(store.clone());
    let north_field = groups
        .create("farm1", "north-field", None)
        .expect("group");
    groups
        .assign_sensor_to_group("farm1", &north_field.oid, "4810")
        .expect("assignment");

    let pipeline = pipeline(store, &broker.uri());
    pipeline
        .dispatcher
        .handle(DataImportEvent { configuration })
        .await;

    let appends: Vec<_> = broker
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|request| request.url.path() == "/v2/op/update")
        .collect();
    assert_eq!(appends.len(), 5);
    let expected_path = format!("/{}", north_field.oid);
    for append in &appends {
        let service_path = append
            .headers
            .get("Fiware-ServicePath")
            .expect("service path header");
        assert_eq!(service_path.to_str().unwrap(), expected_path);
    }
}
