//! Persistent state for vulnerable-target
//!
//! A small key-value abstraction ([`KvStore`]) with SQLite and in-memory
//! backends, and the [`DeploymentLedger`] built on top of it.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use error::{LedgerError, Result, StoreError};
pub use ledger::{DEPLOYMENT_BUCKET, Deployment, DeploymentLedger, deployment_key};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::KvStore;
