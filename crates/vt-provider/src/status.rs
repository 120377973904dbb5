//! Runtime-derived status
//!
//! Values here are recomputed on every query and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed state of one service container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Short (12 char) container id
    pub id: String,
    pub name: String,
    /// Compose service label
    pub service: String,
    /// Lifecycle state, e.g. "running" or "exited"
    pub state: String,
    /// Human readable status, e.g. "Up 2 minutes"
    pub status: String,
    /// "healthy", "unhealthy", "starting", or None without a healthcheck
    pub health: Option<String>,
    /// Published bindings, `host:container/proto`
    pub ports: Vec<String>,
    pub created: Option<DateTime<Utc>>,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }

    /// Running, and either healthy or without a healthcheck
    pub fn is_healthy(&self) -> bool {
        self.is_running() && self.health.as_deref().is_none_or(|h| h == "healthy")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running => write!(f, "running"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Partial,
    Unhealthy,
    Unknown,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Health::Healthy => "healthy",
            Health::Partial => "partial",
            Health::Unhealthy => "unhealthy",
            Health::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Status of one project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub project_name: String,
    pub services: Vec<ServiceStatus>,
}

impl StatusReport {
    pub fn new(project_name: impl Into<String>, services: Vec<ServiceStatus>) -> Self {
        Self {
            project_name: project_name.into(),
            services,
        }
    }

    pub fn run_state(&self) -> RunState {
        aggregate(&self.services).0
    }

    pub fn health(&self) -> Health {
        aggregate(&self.services).1
    }

    pub fn container_count(&self) -> usize {
        self.services.len()
    }

    /// All published ports across services
    pub fn ports(&self) -> Vec<String> {
        self.services
            .iter()
            .flat_map(|s| s.ports.iter().cloned())
            .collect()
    }

    /// One-line summary, e.g. `running (partial) 2/3`
    pub fn summary(&self) -> String {
        let (state, health) = aggregate(&self.services);
        match state {
            RunState::Stopped => state.to_string(),
            RunState::Running => {
                let running = self.services.iter().filter(|s| s.is_running()).count();
                format!("{} ({}) {}/{}", state, health, running, self.services.len())
            }
        }
    }
}

/// Aggregate service states into an overall run state and health.
///
/// No running service means stopped with unknown health. Otherwise health
/// is healthy when every service is healthy, partial when some are, and
/// unhealthy when none are.
pub fn aggregate(services: &[ServiceStatus]) -> (RunState, Health) {
    let running = services.iter().filter(|s| s.is_running()).count();
    if running == 0 {
        return (RunState::Stopped, Health::Unknown);
    }

    let healthy = services.iter().filter(|s| s.is_healthy()).count();
    let health = if healthy == services.len() {
        Health::Healthy
    } else if healthy > 0 {
        Health::Partial
    } else {
        Health::Unhealthy
    };

    (RunState::Running, health)
}

/// Browser-friendly endpoints for published TCP ports
pub fn endpoints(ports: &[String]) -> Vec<String> {
    let mut endpoints: Vec<String> = Vec::new();
    for port in ports {
        let (binding, proto) = port.split_once('/').unwrap_or((port.as_str(), "tcp"));
        if proto != "tcp" {
            continue;
        }
        let Some((host, _)) = binding.rsplit_once(':') else {
            continue;
        };
        // host_ip 付き (0.0.0.0:8080:80) の場合は末尾から2番目
        let host_port = host.rsplit(':').next().unwrap_or(host);
        if host_port.is_empty() || host_port == "0" {
            continue;
        }
        let endpoint = format!("http://127.0.0.1:{}", host_port);
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }
    endpoints
}
