//! # Fieldbridge Library
//!
//! This library imports sensor data from third-party vendor APIs and pushes
//! it as NGSI v2 entities into a FIWARE context broker, one isolated data
//! space per tenant.

pub mod config;
pub mod error;
pub mod fiware;
pub mod handlers;
pub mod import;
pub mod models;
pub mod monitoring;
pub mod repositories;
pub mod scheduler;
pub mod server;
pub mod subscriptions;
pub mod telemetry;
pub mod vendors;
