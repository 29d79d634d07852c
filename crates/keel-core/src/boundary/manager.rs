use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::boundary::error::BoundaryError;
use crate::boundary::failure::{ComponentErrorRecord, ErrorContext};
use crate::boundary::guard::GuardedComponent;
use crate::boundary::stats::ErrorStatistics;
use crate::boundary::strategy::{default_strategies, insert_by_priority, RecoveryContext, RecoveryStrategy};
use crate::config::BoundaryConfig;
use crate::event::{sync_handler, topics, EventChannel, MessageOptions, Priority, SubscribeOptions, SubscriptionHandle};
use crate::kernel::component::Component;
use crate::kernel::constants;
use crate::kernel::coordinator::LifecycleCoordinator;
use crate::utils::{lock, panic_message};

#[derive(Default)]
struct BoundaryState {
    history: HashMap<String, VecDeque<ComponentErrorRecord>>,
    /// Error instants inside the trailing window, oldest first
    windows: HashMap<String, VecDeque<Instant>>,
    lifetime_counts: HashMap<String, u64>,
    isolated: BTreeSet<String>,
    recovering: HashSet<String>,
    components: HashMap<String, Arc<dyn Component>>,
    strategies: Vec<Arc<dyn RecoveryStrategy>>,
    stats: ErrorStatistics,
}

impl BoundaryState {
    /// Drop the per-component bookkeeping that must not outlive a
    /// registration. History and aggregate statistics are kept.
    fn forget(&mut self, id: &str) -> bool {
        self.windows.remove(id);
        self.lifetime_counts.remove(id);
        self.recovering.remove(id);
        self.components.remove(id);
        self.isolated.remove(id)
    }
}

pub(crate) struct BoundaryInner {
    state: Mutex<BoundaryState>,
    channel: EventChannel,
    coordinator: Option<LifecycleCoordinator>,
    config: BoundaryConfig,
    unregistered_watch: Mutex<Option<SubscriptionHandle>>,
}

impl Drop for BoundaryInner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.unregistered_watch).take() {
            handle.unsubscribe();
        }
    }
}

/// Weak reference held by guarded components
#[derive(Clone)]
pub(crate) struct WeakBoundary(Weak<BoundaryInner>);

impl WeakBoundary {
    pub(crate) fn upgrade(&self) -> Option<ErrorBoundary> {
        self.0.upgrade().map(|inner| ErrorBoundary { inner })
    }
}

/// Captures component failures, runs recovery strategies and isolates
/// components that keep failing.
///
/// A component is isolated as soon as its lifetime error count exceeds
/// `max_errors_per_component`, or the errors inside the trailing
/// `error_window_ms` exceed `max_errors_per_window`. Nothing raised by a
/// recovery strategy escapes the boundary.
#[derive(Clone)]
pub struct ErrorBoundary {
    inner: Arc<BoundaryInner>,
}

impl fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("ErrorBoundary")
            .field("tracked_components", &state.history.len())
            .field("isolated", &state.isolated)
            .field("strategies", &state.strategies.iter().map(|s| s.name().to_string()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ErrorBoundary {
    /// Standalone boundary without a lifecycle coordinator
    pub fn new(channel: EventChannel, config: BoundaryConfig) -> Self {
        Self::build(channel, None, config)
    }

    /// Boundary that keeps the coordinator's records in step: failures are
    /// counted against the record and isolation marks it unhealthy.
    pub fn with_coordinator(coordinator: LifecycleCoordinator, config: BoundaryConfig) -> Self {
        let channel = coordinator.channel().clone();
        Self::build(channel, Some(coordinator), config)
    }

    fn build(channel: EventChannel, coordinator: Option<LifecycleCoordinator>, config: BoundaryConfig) -> Self {
        let mut strategies = Vec::new();
        for strategy in default_strategies(&config.strategy_priorities) {
            insert_by_priority(&mut strategies, strategy);
        }
        let inner = Arc::new(BoundaryInner {
            state: Mutex::new(BoundaryState { strategies, ..Default::default() }),
            channel,
            coordinator,
            config,
            unregistered_watch: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let handle = inner.channel.subscribe(
            topics::COMPONENT_UNREGISTERED,
            sync_handler(move |message| {
                if let (Some(inner), Some(id)) = (weak.upgrade(), message.payload()["id"].as_str()) {
                    if lock(&inner.state).forget(id) {
                        log::info!("Released isolation of unregistered component '{}'", id);
                    }
                }
                Ok(Value::Null)
            }),
            SubscribeOptions::new().priority(Priority::High).context("error-boundary"),
        );
        *lock(&inner.unregistered_watch) = Some(handle);

        Self { inner }
    }

    pub fn config(&self) -> &BoundaryConfig {
        &self.inner.config
    }

    pub fn channel(&self) -> &EventChannel {
        &self.inner.channel
    }

    pub(crate) fn downgrade(&self) -> WeakBoundary {
        WeakBoundary(Arc::downgrade(&self.inner))
    }

    /// Wrap a component so failures of its hooks funnel into this boundary.
    ///
    /// With a coordinator attached, the unwrapped component only becomes the
    /// target of `hide` and recovery once its registration succeeded (see
    /// [`Kernel::register`](crate::kernel::Kernel::register)). A standalone
    /// boundary tracks the first instance wrapped under each id.
    pub fn wrap(&self, component: Arc<dyn Component>) -> Arc<GuardedComponent> {
        if self.inner.coordinator.is_none() {
            lock(&self.inner.state)
                .components
                .entry(component.id().to_string())
                .or_insert_with(|| Arc::clone(&component));
        }
        Arc::new(GuardedComponent::new(component, self.downgrade()))
    }

    /// Make `component` the instance isolation and recovery act on.
    pub(crate) fn track(&self, component: &Arc<dyn Component>) {
        lock(&self.inner.state)
            .components
            .insert(component.id().to_string(), Arc::clone(component));
    }

    /// Register an additional recovery strategy
    pub fn add_strategy(&self, strategy: Arc<dyn RecoveryStrategy>) {
        log::debug!("Adding recovery strategy '{}' (priority {})", strategy.name(), strategy.priority());
        insert_by_priority(&mut lock(&self.inner.state).strategies, strategy);
    }

    /// Strategy names in the order they are tried
    pub fn strategy_names(&self) -> Vec<String> {
        lock(&self.inner.state).strategies.iter().map(|s| s.name().to_string()).collect()
    }

    // --- Error handling ---

    /// Record a failure of `component` and react to it.
    ///
    /// The failure is classified, counted and published as `boundary.error`.
    /// If it pushes the component over an isolation threshold the component
    /// is isolated; otherwise, with `auto_recover` enabled, one recovery
    /// attempt is made. Initialize and cleanup failures are never recovered
    /// here; the coordinator reports those to its caller.
    pub async fn handle_error(
        &self,
        component: &Arc<dyn Component>,
        error: &(dyn StdError + Send + Sync + 'static),
        context: ErrorContext,
    ) -> ComponentErrorRecord {
        let id = component.id().to_string();
        let record = ComponentErrorRecord::new(&id, error, context);

        let (lifetime, in_window, already_isolated) = {
            let mut guard = lock(&self.inner.state);
            let state = &mut *guard;
            state.components.entry(id.clone()).or_insert_with(|| Arc::clone(component));

            let history = state.history.entry(id.clone()).or_default();
            history.push_back(record.clone());
            let max_history = self.inner.config.max_history_per_component.max(1);
            while history.len() > max_history {
                history.pop_front();
            }

            let lifetime = state.lifetime_counts.entry(id.clone()).or_default();
            *lifetime += 1;

            let now = Instant::now();
            let horizon = self.inner.config.error_window();
            let window = state.windows.entry(id.clone()).or_default();
            window.push_back(now);
            while window.front().is_some_and(|t| now.duration_since(*t) > horizon) {
                window.pop_front();
            }

            state.stats.record_error(&id, record.kind);
            (*lifetime, window.len(), state.isolated.contains(&id))
        };

        log::error!(
            "Component '{}' failed during {} ({}): {}",
            id, record.context.phase, record.kind, record.error
        );
        if !record.context.phase.is_lifecycle() {
            if let Some(coordinator) = &self.inner.coordinator {
                coordinator.record_failure(&id, record.error.clone()).await;
            }
        }
        self.emit(
            topics::BOUNDARY_ERROR,
            json!({
                "componentId": id,
                "errorId": record.id,
                "error": record.error,
                "kind": record.kind,
                "phase": record.context.phase,
                "detail": record.context.detail,
                "lifetimeErrors": lifetime,
                "windowErrors": in_window,
            }),
            Priority::High,
        )
        .await;

        if already_isolated {
            return record;
        }
        let config = &self.inner.config;
        if lifetime > config.max_errors_per_component || in_window > config.max_errors_per_window {
            log::warn!(
                "Component '{}' exceeded its error budget ({} total, {} in the last {:?}); isolating",
                id,
                lifetime,
                in_window,
                config.error_window()
            );
            self.isolate(&id).await;
            return record;
        }
        if config.auto_recover && !record.context.phase.is_lifecycle() {
            self.recover_component(&id).await;
        }
        self.find_record(&id, &record.id).unwrap_or(record)
    }

    fn find_record(&self, component_id: &str, record_id: &str) -> Option<ComponentErrorRecord> {
        lock(&self.inner.state)
            .history
            .get(component_id)?
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
    }

    /// Try to recover from the component's latest error.
    ///
    /// Runs the first strategy, in priority order, that matches the error.
    /// Returns false when nothing matched, the latest error is already
    /// recovered, a recovery is already in progress, or the strategy failed.
    /// On success the component leaves isolation.
    pub async fn recover_component(&self, id: &str) -> bool {
        let (error, strategy, known) = {
            let state = lock(&self.inner.state);
            let Some(error) = state.history.get(id).and_then(|h| h.back()).cloned() else {
                log::debug!("No recorded error for '{}'; nothing to recover", id);
                return false;
            };
            if error.is_recovered {
                log::debug!("Latest error of '{}' is already recovered", id);
                return false;
            }
            let Some(strategy) = state.strategies.iter().find(|s| s.matches(&error)).cloned() else {
                log::info!("{}", BoundaryError::NoStrategy { component_id: id.to_string() });
                return false;
            };
            (error, strategy, state.components.get(id).cloned())
        };

        let component = match (known, &self.inner.coordinator) {
            (Some(component), _) => Some(component),
            (None, Some(coordinator)) => coordinator.get_component(id).await,
            (None, None) => None,
        };
        let Some(component) = component else {
            log::warn!("{}", BoundaryError::UnknownComponent { component_id: id.to_string() });
            return false;
        };

        if !lock(&self.inner.state).recovering.insert(id.to_string()) {
            log::debug!("Recovery of '{}' already in progress", id);
            return false;
        }

        let name = strategy.name().to_string();
        log::info!("Recovering '{}' with strategy '{}'", id, name);
        let ctx = RecoveryContext {
            component,
            error: error.clone(),
            coordinator: self.inner.coordinator.clone(),
        };
        let started = Instant::now();
        let outcome = AssertUnwindSafe(strategy.recover(&ctx)).catch_unwind().await;
        let elapsed = started.elapsed();

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(BoundaryError::Recovery {
                strategy: name.clone(),
                component_id: id.to_string(),
                message: e.to_string(),
                source: Some(e),
            }),
            Err(payload) => Some(BoundaryError::Recovery {
                strategy: name.clone(),
                component_id: id.to_string(),
                message: format!("strategy panicked: {}", panic_message(payload)),
                source: None,
            }),
        };

        let was_isolated = {
            let mut guard = lock(&self.inner.state);
            let state = &mut *guard;
            state.recovering.remove(id);
            state.stats.record_recovery(failure.is_none(), elapsed);
            if let Some(rec) = state
                .history
                .get_mut(id)
                .and_then(|h| h.iter_mut().find(|r| r.id == error.id))
            {
                rec.recovery_attempts += 1;
                rec.is_recovered = failure.is_none();
            }
            failure.is_none() && state.isolated.remove(id)
        };

        match failure {
            None => {
                log::info!("Recovered '{}' with '{}' in {:?}", id, name, elapsed);
                if let Some(coordinator) = &self.inner.coordinator {
                    if was_isolated {
                        coordinator.set_isolated(id, false).await;
                    }
                    coordinator.mark_recovered(id).await;
                }
                self.emit(
                    topics::BOUNDARY_RECOVERED,
                    json!({
                        "componentId": id,
                        "errorId": error.id,
                        "strategy": name,
                        "durationMs": elapsed.as_millis() as u64,
                        "wasIsolated": was_isolated,
                    }),
                    Priority::Normal,
                )
                .await;
                true
            }
            Some(err) => {
                log::error!("{}", err);
                self.emit(
                    topics::BOUNDARY_RECOVERY_FAILED,
                    json!({
                        "componentId": id,
                        "errorId": error.id,
                        "strategy": name,
                        "error": err.to_string(),
                    }),
                    Priority::High,
                )
                .await;
                false
            }
        }
    }

    // --- Isolation ---

    /// Quarantine a component: hide its output, mark it unhealthy and
    /// suppress its emissions. Returns false if it was already isolated or
    /// is not registered with the coordinator.
    pub async fn isolate(&self, id: &str) -> bool {
        if let Some(coordinator) = &self.inner.coordinator {
            if !coordinator.is_registered(id).await {
                let err = BoundaryError::NotIsolatable {
                    component_id: id.to_string(),
                    reason: "not registered".to_string(),
                };
                log::warn!("{}", err);
                return false;
            }
        }

        let (known, error_count) = {
            let mut state = lock(&self.inner.state);
            if !state.isolated.insert(id.to_string()) {
                log::warn!("Component '{}' is already isolated", id);
                return false;
            }
            (state.components.get(id).cloned(), state.lifetime_counts.get(id).copied().unwrap_or(0))
        };

        let component = match (known, &self.inner.coordinator) {
            (Some(component), _) => Some(component),
            (None, Some(coordinator)) => coordinator.get_component(id).await,
            (None, None) => None,
        };
        let hidden = component
            .map(|c| {
                std::panic::catch_unwind(AssertUnwindSafe(|| c.hide())).unwrap_or_else(|payload| {
                    log::warn!("Hiding '{}' panicked: {}", id, panic_message(payload));
                    false
                })
            })
            .unwrap_or(false);

        if let Some(coordinator) = &self.inner.coordinator {
            coordinator.set_isolated(id, true).await;
        }
        log::warn!("Isolated component '{}'", id);
        self.emit(
            topics::BOUNDARY_ISOLATED,
            json!({ "componentId": id, "errorCount": error_count, "hidden": hidden }),
            Priority::High,
        )
        .await;
        true
    }

    /// Lift isolation and give the component a fresh error budget.
    pub async fn release(&self, id: &str) -> bool {
        {
            let mut state = lock(&self.inner.state);
            if !state.isolated.remove(id) {
                return false;
            }
            state.windows.remove(id);
            state.lifetime_counts.remove(id);
        }
        if let Some(coordinator) = &self.inner.coordinator {
            coordinator.set_isolated(id, false).await;
        }
        log::info!("Released component '{}' from isolation", id);
        self.emit(topics::BOUNDARY_RELEASED, json!({ "componentId": id }), Priority::Normal)
            .await;
        true
    }

    pub fn is_isolated(&self, id: &str) -> bool {
        lock(&self.inner.state).isolated.contains(id)
    }

    /// Isolated component ids, sorted. With a coordinator attached only
    /// registered ids are returned.
    pub async fn get_isolated_components(&self) -> Vec<String> {
        let isolated: Vec<String> = lock(&self.inner.state).isolated.iter().cloned().collect();
        let Some(coordinator) = &self.inner.coordinator else {
            return isolated;
        };
        let mut registered = Vec::with_capacity(isolated.len());
        for id in isolated {
            if coordinator.is_registered(&id).await {
                registered.push(id);
            }
        }
        registered
    }

    // --- Diagnostics ---

    pub fn get_error_statistics(&self) -> ErrorStatistics {
        let state = lock(&self.inner.state);
        let mut stats = state.stats.clone();
        stats.isolated_components = state.isolated.iter().cloned().collect();
        stats
    }

    /// Retained error records of a component, oldest first
    pub fn get_component_error_history(&self, id: &str) -> Vec<ComponentErrorRecord> {
        lock(&self.inner.state)
            .history
            .get(id)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Forget a component's error history and counters. Isolation is not
    /// lifted; use [`release`](Self::release) for that. Returns the number of
    /// records removed.
    pub fn clear_component_errors(&self, id: &str) -> usize {
        let mut state = lock(&self.inner.state);
        state.windows.remove(id);
        state.lifetime_counts.remove(id);
        state.stats.forget_component(id);
        state.history.remove(id).map_or(0, |h| h.len())
    }

    async fn emit(&self, message_type: &str, payload: Value, priority: Priority) {
        let options = MessageOptions::new()
            .source(constants::BOUNDARY_SOURCE)
            .priority(priority);
        if let Err(e) = self.inner.channel.publish_with(message_type, payload, options).await {
            log::warn!("Failed to publish '{}': {}", message_type, e);
        }
    }
}
