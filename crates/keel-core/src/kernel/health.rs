use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::kernel::record::{ComponentStatus, HealthStatus};

/// Health of one component at the time of a check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub id: String,
    pub status: ComponentStatus,
    pub health: HealthStatus,
    pub ready: bool,
    pub healthy: bool,
    pub isolated: bool,
    pub error_count: u64,
}

/// Result of one health tick, published as a single `health.report` message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub components: Vec<ComponentHealth>,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
}

impl HealthReport {
    pub fn new(components: Vec<ComponentHealth>) -> Self {
        let count = |h: HealthStatus| components.iter().filter(|c| c.health == h).count();
        let (healthy, degraded, unhealthy) = (
            count(HealthStatus::Healthy),
            count(HealthStatus::Degraded),
            count(HealthStatus::Unhealthy),
        );
        Self {
            checked_at: Utc::now(),
            components,
            healthy,
            degraded,
            unhealthy,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ComponentHealth> {
        self.components.iter().find(|c| c.id == id)
    }

    /// True when every component is healthy
    pub fn all_healthy(&self) -> bool {
        self.degraded == 0 && self.unhealthy == 0
    }
}
