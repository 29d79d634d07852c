use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a registered component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    #[default]
    Registered,
    Initializing,
    Ready,
    Error,
    /// Terminal
    Destroyed,
}

impl ComponentStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Ready`/`Error` -> `Initializing` is the explicit recovery path.
    pub fn can_transition_to(self, next: ComponentStatus) -> bool {
        use ComponentStatus::*;
        matches!(
            (self, next),
            (Registered, Initializing)
                | (Registered, Destroyed)
                | (Initializing, Ready)
                | (Initializing, Error)
                | (Initializing, Destroyed)
                | (Ready, Error)
                | (Ready, Initializing)
                | (Ready, Destroyed)
                | (Error, Initializing)
                | (Error, Ready)
                | (Error, Destroyed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ComponentStatus::Destroyed
    }
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentStatus::Registered => "registered",
            ComponentStatus::Initializing => "initializing",
            ComponentStatus::Ready => "ready",
            ComponentStatus::Error => "error",
            ComponentStatus::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Classify from the component's own readiness and health flags
    pub fn classify(ready: bool, healthy: bool) -> Self {
        match (ready, healthy) {
            (true, true) => HealthStatus::Healthy,
            (true, false) => HealthStatus::Degraded,
            (false, _) => HealthStatus::Unhealthy,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Bookkeeping the coordinator keeps for each registered component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentRecord {
    pub id: String,
    pub name: String,
    pub component_type: String,
    pub dependencies: Vec<String>,
    pub status: ComponentStatus,
    pub health: HealthStatus,
    pub error_count: u64,
    pub last_error: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub isolated: bool,
    pub registered_at: DateTime<Utc>,
}

impl ComponentRecord {
    pub fn new(id: String, name: String, component_type: String, dependencies: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            component_type,
            dependencies,
            status: ComponentStatus::Registered,
            health: HealthStatus::Healthy,
            error_count: 0,
            last_error: None,
            last_activity: now,
            isolated: false,
            registered_at: now,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub(crate) fn record_error(&mut self, message: String) {
        self.error_count += 1;
        self.last_error = Some(message);
        self.touch();
    }
}
