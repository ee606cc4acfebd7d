//! # Repository Layer
//!
//! Tenants, device groups, third-party API configurations and subscription
//! flags live in one in-process application store. The store optionally
//! snapshots itself to a JSON file after every mutation so state survives a
//! restart; repositories wrap it with a typed, tenant-aware API.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;
use crate::models::{Group, Tenant, ThirdPartyApiConfiguration};

pub mod configuration;
pub mod group;
pub mod subscription;
pub mod tenant;

pub use configuration::ThirdPartyApiConfigurationRepository;
pub use group::GroupRepository;
pub use subscription::SubscriptionStatusRepository;
pub use tenant::TenantRepository;

/// Everything the service persists, serialized as one snapshot document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ApplicationData {
    pub tenants: Vec<Tenant>,
    pub groups: Vec<Group>,
    pub configurations: Vec<ThirdPartyApiConfiguration>,
    /// Tenant ids whose broker subscription has been registered
    pub subscriptions_sent: BTreeSet<String>,
}

/// Shared application store backing all repositories.
#[derive(Debug)]
pub struct ApplicationStore {
    data: RwLock<ApplicationData>,
    snapshot_path: Option<PathBuf>,
}

impl ApplicationStore {
    /// A store without snapshot persistence, used in tests and when no
    /// snapshot path is configured.
    pub fn in_memory() -> Self {
        Self {
            data: RwLock::new(ApplicationData::default()),
            snapshot_path: None,
        }
    }

    /// Opens a store backed by a snapshot file. A missing file starts an
    /// empty store; an unreadable or malformed file is an error.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(RepositoryError::snapshot_error)?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => ApplicationData::default(),
            Err(err) => return Err(RepositoryError::snapshot_error(err)),
        };
        Ok(Self {
            data: RwLock::new(data),
            snapshot_path: Some(path),
        })
    }

    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&ApplicationData) -> T,
    ) -> Result<T, RepositoryError> {
        let data = self.data.read().map_err(|_| RepositoryError::StorePoisoned)?;
        Ok(f(&data))
    }

    /// Runs a mutation and writes the snapshot afterwards. The closure
    /// validates before mutating, so a returned error leaves the data
    /// unchanged and skips the snapshot write.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&mut ApplicationData) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut data = self.data.write().map_err(|_| RepositoryError::StorePoisoned)?;
        let result = f(&mut data)?;
        self.persist_snapshot(&data)?;
        Ok(result)
    }

    fn persist_snapshot(&self, data: &ApplicationData) -> Result<(), RepositoryError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(data).map_err(RepositoryError::snapshot_error)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).map_err(RepositoryError::snapshot_error)?;
        fs::rename(&tmp, path).map_err(RepositoryError::snapshot_error)?;
        Ok(())
    }
}
