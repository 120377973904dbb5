//! Provider trait definition

use async_trait::async_trait;
use vt_core::Template;

use crate::error::Result;
use crate::status::StatusReport;

/// Deployment backend abstraction
///
/// Each backend (docker compose, ...) implements this trait so callers can
/// start, stop and inspect a template without knowing which backend runs it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the provider name (e.g., "docker-compose")
    fn name(&self) -> &str;

    /// Bring the template's environment up and record the deployment
    async fn start(&self, template: &Template) -> Result<()>;

    /// Tear the environment down and remove the deployment record
    async fn stop(&self, template: &Template) -> Result<()>;

    /// Observe the runtime state. Never modifies the ledger.
    async fn status(&self, template: &Template) -> Result<StatusReport>;
}
