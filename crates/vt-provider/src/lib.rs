//! Provider abstraction for vulnerable-target
//!
//! A [`Provider`] runs a template's environment on some backend. The
//! [`Registry`] maps provider names to instances.

pub mod error;
pub mod provider;
pub mod registry;
pub mod status;

pub use error::{ProviderError, Result};
pub use provider::Provider;
pub use registry::Registry;
pub use status::{Health, RunState, ServiceStatus, StatusReport, aggregate, endpoints};
