//! # Context Broker Integration
//!
//! NGSI v2 client for the external entity store. The pipeline consumes it
//! through the `EntityStore` and `SubscriptionGateway` traits so tests can
//! substitute mocks; `ContextBrokerClient` is the production implementation
//! speaking the batch-update and subscription APIs with tenant-scoped
//! service headers.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::BrokerConfig;
use crate::models::{DeviceMeasurement, EntityType, Group, Tenant};

/// HTTP header identifying the tenant a broker request belongs to.
pub const FIWARE_SERVICE: &str = "Fiware-Service";

/// HTTP header identifying the service path below the tenant.
pub const FIWARE_SERVICE_PATH: &str = "Fiware-ServicePath";

/// Errors an entity upsert can fail with.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("context broker returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error while calling the context broker: {0}")]
    Network(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

/// Errors a subscription registration can fail with.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("context broker returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error while registering the subscription: {0}")]
    Network(String),
}

impl From<reqwest::Error> for SubscriptionError {
    fn from(err: reqwest::Error) -> Self {
        SubscriptionError::Network(err.to_string())
    }
}

/// Upserts normalized entities, idempotent on entity id.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn append_entity(
        &self,
        tenant: &Tenant,
        group: &Group,
        entity: &DeviceMeasurement,
    ) -> Result<(), StoreError>;
}

/// Registers notification subscriptions on behalf of a tenant.
#[async_trait]
pub trait SubscriptionGateway: Send + Sync {
    async fn subscribe(
        &self,
        tenant: &Tenant,
        entity_types: &[EntityType],
    ) -> Result<(), SubscriptionError>;
}

/// Broker reachability probe result.
#[derive(Debug, Clone)]
pub struct BrokerStatus {
    /// Version string reported by the broker, if it exposes one
    pub version: Option<String>,
}

/// NGSI v2 context broker client.
pub struct ContextBrokerClient {
    http: reqwest::Client,
    base_url: String,
    notification_url: String,
}

impl ContextBrokerClient {
    pub fn new(http: reqwest::Client, config: &BrokerConfig) -> Self {
        Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            notification_url: config.notification_url.clone(),
        }
    }

    /// Probes the broker's version endpoint.
    pub async fn version(&self) -> Result<BrokerStatus, StoreError> {
        let response = self
            .http
            .get(format!("{}/version", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Http { status, body });
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| StoreError::Network(err.to_string()))?;
        let version = body
            .pointer("/orion/version")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        Ok(BrokerStatus { version })
    }
}

#[async_trait]
impl EntityStore for ContextBrokerClient {
    async fn append_entity(
        &self,
        tenant: &Tenant,
        group: &Group,
        entity: &DeviceMeasurement,
    ) -> Result<(), StoreError> {
        let request = json!({
            "actionType": "append",
            "entities": [entity.to_ngsi_json()],
        });
        debug!(entity_id = %entity.id, tenant_id = %tenant.tenant_id, "appending entity");

        let response = self
            .http
            .post(format!("{}/v2/op/update", self.base_url))
            .header(FIWARE_SERVICE, &tenant.tenant_id)
            .header(FIWARE_SERVICE_PATH, group.service_path())
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Http { status, body })
        }
    }
}

#[async_trait]
impl SubscriptionGateway for ContextBrokerClient {
    async fn subscribe(
        &self,
        tenant: &Tenant,
        entity_types: &[EntityType],
    ) -> Result<(), SubscriptionError> {
        let entities: Vec<serde_json::Value> = entity_types
            .iter()
            .map(|entity_type| json!({"idPattern": ".*", "type": entity_type.key()}))
            .collect();
        let request = json!({
            "description": format!("Measurement notifications for tenant {}", tenant.tenant_id),
            "subject": {
                "entities": entities,
                "condition": {"attrs": ["numValue"]},
            },
            "notification": {
                "http": {"url": self.notification_url},
            },
        });

        let response = self
            .http
            .post(format!("{}/v2/subscriptions", self.base_url))
            .header(FIWARE_SERVICE, &tenant.tenant_id)
            .header(FIWARE_SERVICE_PATH, "/#")
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(SubscriptionError::Http { status, body })
        }
    }
}
