use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::boundary::failure::FailureKind;

/// Aggregate counters maintained by the error boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStatistics {
    pub total_errors: u64,
    pub recovered: u64,
    pub failed_recoveries: u64,
    pub recovery_attempts: u64,
    /// `recovered / recovery_attempts`, 0 before the first attempt
    pub recovery_rate: f64,
    /// Mean duration of successful recoveries
    pub average_recovery_ms: f64,
    pub errors_by_component: BTreeMap<String, u64>,
    pub errors_by_kind: BTreeMap<FailureKind, u64>,
    pub isolated_components: Vec<String>,
    #[serde(skip)]
    total_recovery_time: Duration,
}

impl ErrorStatistics {
    pub(crate) fn record_error(&mut self, component_id: &str, kind: FailureKind) {
        self.total_errors += 1;
        *self.errors_by_component.entry(component_id.to_string()).or_default() += 1;
        *self.errors_by_kind.entry(kind).or_default() += 1;
    }

    pub(crate) fn record_recovery(&mut self, succeeded: bool, elapsed: Duration) {
        self.recovery_attempts += 1;
        if succeeded {
            self.recovered += 1;
            self.total_recovery_time += elapsed;
            self.average_recovery_ms = self.total_recovery_time.as_secs_f64() * 1000.0 / self.recovered as f64;
        } else {
            self.failed_recoveries += 1;
        }
        self.recovery_rate = self.recovered as f64 / self.recovery_attempts as f64;
    }

    /// Forget a component's per-component counter; totals are kept
    pub(crate) fn forget_component(&mut self, component_id: &str) {
        self.errors_by_component.remove(component_id);
    }
}
