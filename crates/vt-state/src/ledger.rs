//! Deployment ledger
//!
//! Durable record of which (provider, template) pairs the system believes
//! it started. The ledger is not reconciled against the container runtime;
//! drift is detected by the status monitor.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{LedgerError, Result};
use crate::memory::MemoryStore;
use crate::sqlite::SqliteStore;
use crate::store::KvStore;

/// Bucket holding every deployment record
pub const DEPLOYMENT_BUCKET: &str = "deployment";

/// Status written for every new deployment
pub const STATUS_RUNNING: &str = "running";

/// A single ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub provider_name: String,
    pub template_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Deployment {
    pub fn new(provider: impl Into<String>, template_id: impl Into<String>) -> Self {
        Self {
            provider_name: provider.into(),
            template_id: template_id.into(),
            status: STATUS_RUNNING.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Storage key, `provider:template`
    pub fn key(&self) -> String {
        deployment_key(&self.provider_name, &self.template_id)
    }
}

pub fn deployment_key(provider: &str, template_id: &str) -> String {
    format!("{}:{}", provider, template_id)
}

/// Deployment records over any [`KvStore`]
#[derive(Clone)]
pub struct DeploymentLedger {
    store: Arc<dyn KvStore>,
}

impl DeploymentLedger {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Open the SQLite-backed ledger at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = SqliteStore::open(path).await?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Non-persistent ledger
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Record a new deployment.
    ///
    /// Fails with [`LedgerError::AlreadyExists`] if the pair is already
    /// recorded. The check and the write are one atomic insert, so of two
    /// concurrent callers exactly one succeeds.
    #[instrument(skip(self))]
    pub async fn add_new_deployment(&self, provider: &str, template_id: &str) -> Result<()> {
        let deployment = Deployment::new(provider, template_id);
        let value = serde_json::to_vec(&deployment)?;

        let inserted = self
            .store
            .insert(DEPLOYMENT_BUCKET, deployment.key().as_bytes(), &value)
            .await?;

        if !inserted {
            return Err(LedgerError::AlreadyExists {
                provider: provider.to_string(),
                template: template_id.to_string(),
            });
        }

        info!(key = %deployment.key(), "Deployment recorded");
        Ok(())
    }

    /// Remove a deployment.
    ///
    /// Fails with [`LedgerError::NotFound`] if nothing was recorded.
    #[instrument(skip(self))]
    pub async fn remove_deployment(&self, provider: &str, template_id: &str) -> Result<()> {
        let key = deployment_key(provider, template_id);
        let removed = self.store.delete(DEPLOYMENT_BUCKET, key.as_bytes()).await?;

        if !removed {
            return Err(LedgerError::NotFound {
                provider: provider.to_string(),
                template: template_id.to_string(),
            });
        }

        info!(key = %key, "Deployment removed");
        Ok(())
    }

    pub async fn deployment_exists(&self, provider: &str, template_id: &str) -> Result<bool> {
        Ok(self.get_deployment(provider, template_id).await?.is_some())
    }

    pub async fn get_deployment(
        &self,
        provider: &str,
        template_id: &str,
    ) -> Result<Option<Deployment>> {
        let key = deployment_key(provider, template_id);
        match self.store.get(DEPLOYMENT_BUCKET, key.as_bytes()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All deployments, ordered by key
    pub async fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let entries = self.store.scan(DEPLOYMENT_BUCKET).await?;
        debug!(count = entries.len(), "Listing deployments");

        entries
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(LedgerError::from))
            .collect()
    }
}
