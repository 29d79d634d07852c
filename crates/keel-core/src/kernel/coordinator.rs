use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::LifecycleConfig;
use crate::event::{topics, EventChannel, MessageOptions, Priority};
use crate::kernel::component::Component;
use crate::kernel::constants;
use crate::kernel::error::{Error, LifecyclePhase, Result};
use crate::kernel::graph::DependencyGraph;
use crate::kernel::health::{ComponentHealth, HealthReport};
use crate::kernel::record::{ComponentRecord, ComponentStatus, HealthStatus};
use crate::utils::{lock, panic_message};

/// Outcome of [`LifecycleCoordinator::destroy_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyReport {
    /// Every component that reached `destroyed`, in destruction order
    pub destroyed: Vec<String>,
    /// Components whose cleanup hook failed; they are destroyed regardless
    pub failed: Vec<String>,
}

impl DestroyReport {
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Outcome of [`LifecycleCoordinator::validate_dependencies`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyValidation {
    /// Dependency ids (direct or transitive) absent from the registry
    pub missing: Vec<String>,
    /// Ids on a dependency cycle reachable from the validated component
    pub circular: Vec<String>,
}

impl DependencyValidation {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.circular.is_empty()
    }
}

#[derive(Default)]
struct CoordinatorState {
    components: HashMap<String, Arc<dyn Component>>,
    records: HashMap<String, ComponentRecord>,
    graph: DependencyGraph,
    /// Registered but not yet initialized, in registration order
    pending: Vec<String>,
}

struct CoordinatorInner {
    state: Mutex<CoordinatorState>,
    channel: EventChannel,
    config: LifecycleConfig,
    monitor: StdMutex<Option<JoinHandle<()>>>,
}

impl Drop for CoordinatorInner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.monitor).take() {
            handle.abort();
        }
    }
}

/// Registry of components that drives them through their lifecycle in
/// dependency order and polls their health.
///
/// Cloning is cheap; clones share the same registry. The registry lock is
/// never held while a component hook runs or a message is published, so
/// hooks and listeners may call back into the coordinator.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("config", &self.inner.config)
            .field("monitoring", &self.is_monitoring())
            .finish_non_exhaustive()
    }
}

impl LifecycleCoordinator {
    pub fn new(channel: EventChannel, config: LifecycleConfig) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                state: Mutex::new(CoordinatorState::default()),
                channel,
                config,
                monitor: StdMutex::new(None),
            }),
        }
    }

    pub fn channel(&self) -> &EventChannel {
        &self.inner.channel
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    // --- Registration ---

    /// Register a component and queue it for initialization.
    ///
    /// Returns `Ok(false)` if a component with the same id is already
    /// registered; the new instance is ignored. Dependencies that are not
    /// registered yet are reported but do not prevent registration.
    pub async fn register(&self, component: Arc<dyn Component>) -> Result<bool> {
        let id = component.id().to_string();
        let dependencies = component.dependencies();
        Self::validate_descriptor(&id, &dependencies)?;

        let missing = {
            let mut state = self.inner.state.lock().await;
            if state.records.contains_key(&id) {
                log::warn!("Component '{}' is already registered; ignoring duplicate", id);
                return Ok(false);
            }
            let record = ComponentRecord::new(
                id.clone(),
                component.name().to_string(),
                component.component_type().to_string(),
                dependencies.clone(),
            );
            state.records.insert(id.clone(), record);
            state.components.insert(id.clone(), component);
            state.graph.add_node(&id, &dependencies);
            state.pending.push(id.clone());
            state.graph.missing_dependencies(&id)
        };

        if !missing.is_empty() {
            log::warn!(
                "Component '{}' depends on unregistered component(s): {}",
                id,
                missing.join(", ")
            );
        }
        log::info!("Registered component '{}'", id);
        self.emit(
            topics::COMPONENT_REGISTERED,
            json!({ "id": id, "dependencies": dependencies, "missingDependencies": missing }),
            Priority::Normal,
        )
        .await;
        Ok(true)
    }

    fn validate_descriptor(id: &str, dependencies: &[String]) -> Result<()> {
        let reject = |reason: &str| Error::Registration {
            component_id: id.to_string(),
            reason: reason.to_string(),
        };
        if id.trim().is_empty() {
            return Err(reject("component id must not be empty"));
        }
        if dependencies.iter().any(|d| d.trim().is_empty()) {
            return Err(reject("dependency ids must not be empty"));
        }
        if dependencies.iter().any(|d| d == id) {
            return Err(reject("a component cannot depend on itself"));
        }
        Ok(())
    }

    /// Destroy (best effort) and forget a component.
    ///
    /// Returns false if it was not registered.
    pub async fn unregister(&self, id: &str) -> Result<bool> {
        if !self.is_registered(id).await {
            return Ok(false);
        }
        if let Err(e) = self.destroy(id).await {
            log::warn!("Cleanup of '{}' failed during unregistration: {}", id, e);
        }
        {
            let mut state = self.inner.state.lock().await;
            state.components.remove(id);
            state.records.remove(id);
            state.graph.remove_node(id);
            state.pending.retain(|p| p != id);
        }
        log::info!("Unregistered component '{}'", id);
        self.emit(topics::COMPONENT_UNREGISTERED, json!({ "id": id }), Priority::Normal)
            .await;
        Ok(true)
    }

    // --- Initialization ---

    /// Initialize every pending component in dependency order.
    ///
    /// Components run one at a time and each settles before the next starts.
    /// The first failure aborts the pass; components after it stay pending.
    /// A component whose registered dependency is not ready (for instance
    /// one left in `error` by an earlier pass) is skipped and stays pending.
    /// A dependency cycle among the pending components fails the pass
    /// before any of them is touched. Returns the ids initialized.
    pub async fn initialize_all(&self) -> Result<Vec<String>> {
        let order = {
            let state = self.inner.state.lock().await;
            for id in &state.pending {
                let missing = state.graph.missing_dependencies(id);
                if !missing.is_empty() {
                    log::warn!(
                        "Initializing '{}' with unregistered dependencies: {}",
                        id,
                        missing.join(", ")
                    );
                }
            }
            state.graph.topological_order(&state.pending).inspect_err(|e| {
                log::error!("Aborting initialization: {}", e);
            })?
        };

        log::info!("Initializing {} component(s): {}", order.len(), order.join(", "));
        let mut initialized = Vec::with_capacity(order.len());
        let mut blocked = Vec::new();
        for id in order {
            if let Some(dependency) = self.unready_dependency(&id).await {
                log::warn!(
                    "Skipping '{}': dependency '{}' is not ready; it stays pending",
                    id,
                    dependency
                );
                blocked.push(id);
                continue;
            }
            self.initialize(&id).await?;
            initialized.push(id);
        }

        self.emit(
            topics::LIFECYCLE_INITIALIZED,
            json!({ "initialized": initialized, "blocked": blocked }),
            Priority::Normal,
        )
        .await;
        Ok(initialized)
    }

    /// First registered dependency of `id` that is not ready.
    /// Unregistered dependencies are tolerated and never block.
    async fn unready_dependency(&self, id: &str) -> Option<String> {
        let state = self.inner.state.lock().await;
        state.graph.dependencies_of(id).into_iter().find(|dependency| {
            state
                .records
                .get(dependency)
                .is_some_and(|record| record.status != ComponentStatus::Ready)
        })
    }

    /// Run the `initialize` hook of a registered component.
    ///
    /// A component that is already ready is left alone. A failing (or
    /// panicking) hook moves the component to `error`/`unhealthy`, emits
    /// `component.error` and is returned as [`Error::Lifecycle`].
    pub async fn initialize(&self, id: &str) -> Result<()> {
        let component = {
            let mut state = self.inner.state.lock().await;
            let status = Self::record_mut(&mut state, id)?.status;
            if status == ComponentStatus::Ready {
                log::debug!("Component '{}' is already ready", id);
                return Ok(());
            }
            if status != ComponentStatus::Registered {
                return Err(Error::InvalidTransition {
                    component_id: id.to_string(),
                    from: status,
                    to: ComponentStatus::Initializing,
                });
            }
            Self::begin_initialize(&mut state, id)?
        };
        self.run_initialize(id, component).await
    }

    /// Run the `initialize` hook again for a component in `ready` or
    /// `error` state. This is the only way back to `initializing`.
    pub async fn reinitialize(&self, id: &str) -> Result<()> {
        let component = {
            let mut state = self.inner.state.lock().await;
            let status = Self::record_mut(&mut state, id)?.status;
            if !matches!(status, ComponentStatus::Ready | ComponentStatus::Error) {
                return Err(Error::InvalidTransition {
                    component_id: id.to_string(),
                    from: status,
                    to: ComponentStatus::Initializing,
                });
            }
            Self::begin_initialize(&mut state, id)?
        };
        log::info!("Reinitializing component '{}'", id);
        self.run_initialize(id, component).await
    }

    fn begin_initialize(state: &mut CoordinatorState, id: &str) -> Result<Arc<dyn Component>> {
        let component = state
            .components
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotRegistered { component_id: id.to_string() })?;
        let record = Self::record_mut(state, id)?;
        record.status = ComponentStatus::Initializing;
        record.touch();
        state.pending.retain(|p| p != id);
        Ok(component)
    }

    async fn run_initialize(&self, id: &str, component: Arc<dyn Component>) -> Result<()> {
        self.emit(topics::COMPONENT_INITIALIZING, json!({ "id": id }), Priority::Normal)
            .await;

        let (message, source) = match AssertUnwindSafe(component.initialize()).catch_unwind().await {
            Ok(Ok(())) => {
                if self.settle(id, ComponentStatus::Ready, HealthStatus::Healthy, None).await {
                    log::info!("Component '{}' is ready", id);
                    self.emit(topics::COMPONENT_READY, json!({ "id": id }), Priority::Normal)
                        .await;
                }
                return Ok(());
            }
            Ok(Err(e)) => (e.to_string(), Some(e)),
            Err(payload) => (format!("initialize panicked: {}", panic_message(payload)), None),
        };

        log::error!("Component '{}' failed to initialize: {}", id, message);
        self.settle(id, ComponentStatus::Error, HealthStatus::Unhealthy, Some(message.clone()))
            .await;
        self.emit(
            topics::COMPONENT_ERROR,
            json!({ "id": id, "phase": "initialize", "error": message }),
            Priority::High,
        )
        .await;
        Err(Error::Lifecycle {
            phase: LifecyclePhase::Initialize,
            component_id: id.to_string(),
            message,
            source,
        })
    }

    /// Apply the result of an initialize hook. Returns false if the component
    /// was destroyed or unregistered while the hook ran.
    async fn settle(&self, id: &str, status: ComponentStatus, health: HealthStatus, error: Option<String>) -> bool {
        let mut state = self.inner.state.lock().await;
        let Some(record) = state.records.get_mut(id) else {
            return false;
        };
        if record.status != ComponentStatus::Initializing {
            log::debug!("Component '{}' moved to {} while initializing", id, record.status);
            return false;
        }
        record.status = status;
        record.health = if record.isolated { HealthStatus::Unhealthy } else { health };
        match error {
            Some(message) => record.record_error(message),
            None => record.touch(),
        }
        true
    }

    // --- Destruction ---

    /// Run the `cleanup` hook and mark the component destroyed.
    ///
    /// The component is destroyed even if cleanup fails; the failure is
    /// returned as [`Error::Lifecycle`].
    pub async fn destroy(&self, id: &str) -> Result<()> {
        let component = {
            let mut state = self.inner.state.lock().await;
            let status = Self::record_mut(&mut state, id)?.status;
            if status.is_terminal() {
                return Ok(());
            }
            state.pending.retain(|p| p != id);
            state.components.get(id).cloned()
        };
        let Some(component) = component else {
            return Err(Error::NotRegistered { component_id: id.to_string() });
        };

        let failure = match AssertUnwindSafe(component.cleanup()).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some((e.to_string(), Some(e))),
            Err(payload) => Some((format!("cleanup panicked: {}", panic_message(payload)), None)),
        };

        {
            let mut state = self.inner.state.lock().await;
            if let Some(record) = state.records.get_mut(id) {
                record.status = ComponentStatus::Destroyed;
                match &failure {
                    Some((message, _)) => record.record_error(message.clone()),
                    None => record.touch(),
                }
            }
        }

        let error = failure.as_ref().map(|(message, _)| message.clone());
        self.emit(topics::COMPONENT_DESTROYED, json!({ "id": id, "error": error }), Priority::Normal)
            .await;

        match failure {
            None => {
                log::info!("Destroyed component '{}'", id);
                Ok(())
            }
            Some((message, source)) => {
                log::error!("Cleanup of component '{}' failed: {}", id, message);
                Err(Error::Lifecycle {
                    phase: LifecyclePhase::Cleanup,
                    component_id: id.to_string(),
                    message,
                    source,
                })
            }
        }
    }

    /// Destroy every registered component, dependents before their
    /// dependencies. A failing cleanup never stops the others.
    pub async fn destroy_all(&self) -> DestroyReport {
        self.stop_health_monitoring();
        let order = {
            let state = self.inner.state.lock().await;
            let live: Vec<String> = state
                .graph
                .nodes()
                .iter()
                .filter(|id| state.records.get(*id).is_some_and(|r| !r.status.is_terminal()))
                .cloned()
                .collect();
            let mut order = state.graph.topological_order(&live).unwrap_or_else(|e| {
                log::warn!("{}; destroying in registration order", e);
                live.clone()
            });
            order.reverse();
            order
        };

        let mut report = DestroyReport::default();
        for id in order {
            match self.destroy(&id).await {
                Ok(()) => {}
                Err(Error::NotRegistered { .. }) => continue,
                Err(_) => report.failed.push(id.clone()),
            }
            report.destroyed.push(id);
        }
        if !report.failed.is_empty() {
            log::warn!("{} component(s) failed to clean up: {}", report.failed.len(), report.failed.join(", "));
        }
        report
    }

    // --- Health monitoring ---

    /// Start periodic health checks at the configured interval.
    ///
    /// Returns false if monitoring is already running or no Tokio runtime is
    /// available. The first check happens one interval after starting.
    pub fn start_health_monitoring(&self) -> bool {
        let mut monitor = lock(&self.inner.monitor);
        if monitor.as_ref().is_some_and(|h| !h.is_finished()) {
            log::debug!("Health monitoring already running");
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            log::warn!("No async runtime available; health monitoring not started");
            return false;
        };

        let period = self.inner.config.health_check_interval();
        let weak: Weak<CoordinatorInner> = Arc::downgrade(&self.inner);
        *monitor = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                LifecycleCoordinator { inner }.check_health().await;
            }
        }));
        log::info!("Health monitoring started ({:?} interval)", period);
        true
    }

    /// Returns false if monitoring was not running
    pub fn stop_health_monitoring(&self) -> bool {
        match lock(&self.inner.monitor).take() {
            Some(handle) => {
                handle.abort();
                log::info!("Health monitoring stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.inner.monitor).as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Poll every live component once and publish the batched result as
    /// `health.report`.
    ///
    /// Isolated components are always unhealthy. With no live components
    /// nothing is published unless `emit_empty_health_reports` is set.
    pub async fn check_health(&self) -> HealthReport {
        let snapshot: Vec<(String, Arc<dyn Component>, bool, ComponentStatus, u64)> = {
            let state = self.inner.state.lock().await;
            state
                .graph
                .nodes()
                .iter()
                .filter_map(|id| {
                    let record = state.records.get(id)?;
                    if record.status.is_terminal() {
                        return None;
                    }
                    let component = state.components.get(id)?;
                    Some((id.clone(), Arc::clone(component), record.isolated, record.status, record.error_count))
                })
                .collect()
        };

        let mut checks = Vec::with_capacity(snapshot.len());
        for (id, component, isolated, status, error_count) in snapshot {
            let probe = std::panic::catch_unwind(AssertUnwindSafe(|| (component.is_ready(), component.is_healthy())));
            let (ready, healthy) = probe.unwrap_or_else(|payload| {
                log::warn!("Health probe of '{}' panicked: {}", id, panic_message(payload));
                (false, false)
            });
            let health = if isolated {
                HealthStatus::Unhealthy
            } else {
                HealthStatus::classify(ready, healthy)
            };
            checks.push(ComponentHealth { id, status, health, ready, healthy, isolated, error_count });
        }

        {
            let mut state = self.inner.state.lock().await;
            for check in &checks {
                if let Some(record) = state.records.get_mut(&check.id) {
                    record.health = check.health;
                }
            }
        }

        let report = HealthReport::new(checks);
        if report.is_empty() && !self.inner.config.emit_empty_health_reports {
            log::trace!("Skipping empty health report");
            return report;
        }
        log::debug!(
            "Health check: {} healthy, {} degraded, {} unhealthy",
            report.healthy, report.degraded, report.unhealthy
        );
        match serde_json::to_value(&report) {
            Ok(payload) => self.emit(topics::HEALTH_REPORT, payload, Priority::Normal).await,
            Err(e) => log::error!("Failed to serialize health report: {}", e),
        }
        report
    }

    // --- Dependency queries ---

    /// Transitive dependencies of `id`, deepest first, ending with `id`.
    /// Unregistered dependency ids appear in the chain but are not expanded.
    pub async fn get_dependency_chain(&self, id: &str) -> Vec<String> {
        let state = self.inner.state.lock().await;
        if !state.graph.contains(id) {
            return Vec::new();
        }
        state.graph.dependency_chain(id)
    }

    pub async fn validate_dependencies(&self, id: &str) -> DependencyValidation {
        let state = self.inner.state.lock().await;
        let missing = state
            .graph
            .dependency_chain(id)
            .into_iter()
            .filter(|dep| dep != id && !state.records.contains_key(dep))
            .collect();
        DependencyValidation {
            missing,
            circular: state.graph.find_cycles_from(id),
        }
    }

    pub async fn dependents_of(&self, id: &str) -> Vec<String> {
        self.inner.state.lock().await.graph.dependents_of(id)
    }

    // --- Accessors ---

    pub async fn is_registered(&self, id: &str) -> bool {
        self.inner.state.lock().await.records.contains_key(id)
    }

    pub async fn get_record(&self, id: &str) -> Option<ComponentRecord> {
        self.inner.state.lock().await.records.get(id).cloned()
    }

    /// All records in registration order
    pub async fn records(&self) -> Vec<ComponentRecord> {
        let state = self.inner.state.lock().await;
        state
            .graph
            .nodes()
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect()
    }

    pub async fn get_component(&self, id: &str) -> Option<Arc<dyn Component>> {
        self.inner.state.lock().await.components.get(id).cloned()
    }

    /// Registered ids in registration order
    pub async fn component_ids(&self) -> Vec<String> {
        self.inner.state.lock().await.graph.nodes().to_vec()
    }

    pub async fn status_of(&self, id: &str) -> Option<ComponentStatus> {
        self.inner.state.lock().await.records.get(id).map(|r| r.status)
    }

    /// Ids waiting for the next [`initialize_all`](Self::initialize_all)
    pub async fn pending(&self) -> Vec<String> {
        self.inner.state.lock().await.pending.clone()
    }

    // --- Error boundary hooks ---

    /// Count a runtime failure against the component and move it to `error`.
    pub(crate) async fn record_failure(&self, id: &str, message: String) -> bool {
        let mut state = self.inner.state.lock().await;
        let Some(record) = state.records.get_mut(id) else {
            return false;
        };
        record.record_error(message);
        if record.status.can_transition_to(ComponentStatus::Error) {
            record.status = ComponentStatus::Error;
        }
        record.health = HealthStatus::Unhealthy;
        true
    }

    /// Return a component in `error` state to `ready` after a successful
    /// recovery.
    pub(crate) async fn mark_recovered(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let Some(record) = state.records.get_mut(id) else {
            return false;
        };
        if record.status == ComponentStatus::Error {
            record.status = ComponentStatus::Ready;
        }
        if !record.isolated {
            record.health = HealthStatus::Healthy;
        }
        record.touch();
        true
    }

    pub(crate) async fn set_health(&self, id: &str, health: HealthStatus) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.records.get_mut(id) {
            Some(record) => {
                record.health = health;
                true
            }
            None => false,
        }
    }

    pub(crate) async fn set_isolated(&self, id: &str, isolated: bool) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.records.get_mut(id) {
            Some(record) => {
                record.isolated = isolated;
                if isolated {
                    record.health = HealthStatus::Unhealthy;
                }
                true
            }
            None => false,
        }
    }

    // --- Internals ---

    fn record_mut<'a>(state: &'a mut CoordinatorState, id: &str) -> Result<&'a mut ComponentRecord> {
        state
            .records
            .get_mut(id)
            .ok_or_else(|| Error::NotRegistered { component_id: id.to_string() })
    }

    async fn emit(&self, message_type: &str, payload: Value, priority: Priority) {
        let options = MessageOptions::new()
            .source(constants::LIFECYCLE_SOURCE)
            .priority(priority);
        if let Err(e) = self.inner.channel.publish_with(message_type, payload, options).await {
            log::warn!("Failed to publish '{}': {}", message_type, e);
        }
    }
}
