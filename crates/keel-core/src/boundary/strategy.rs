use std::sync::Arc;

use async_trait::async_trait;

use crate::boundary::failure::{ComponentErrorRecord, ComponentFailure, FailureKind};
use crate::config::StrategyPriorities;
use crate::event::BoxError;
use crate::kernel::component::Component;
use crate::kernel::coordinator::LifecycleCoordinator;

/// What a strategy gets to work with
pub struct RecoveryContext {
    pub component: Arc<dyn Component>,
    /// The failure being recovered from
    pub error: ComponentErrorRecord,
    /// Set when the boundary is attached to a coordinator
    pub coordinator: Option<LifecycleCoordinator>,
}

/// A recovery action selected by failure category.
///
/// The boundary tries strategies in descending priority and runs only the
/// first one whose [`matches`](RecoveryStrategy::matches) accepts the error.
#[async_trait]
pub trait RecoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> i32;

    fn matches(&self, error: &ComponentErrorRecord) -> bool;

    async fn recover(&self, ctx: &RecoveryContext) -> Result<(), BoxError>;
}

/// Runs the component's `initialize` hook again. Matches
/// [`FailureKind::MissingReference`].
pub struct ReinitializeStrategy {
    priority: i32,
}

impl ReinitializeStrategy {
    pub fn new(priority: i32) -> Self {
        Self { priority }
    }
}

#[async_trait]
impl RecoveryStrategy for ReinitializeStrategy {
    fn name(&self) -> &str {
        "reinitialize"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn matches(&self, error: &ComponentErrorRecord) -> bool {
        error.kind == FailureKind::MissingReference
    }

    async fn recover(&self, ctx: &RecoveryContext) -> Result<(), BoxError> {
        let id = &ctx.error.component_id;
        if let Some(coordinator) = &ctx.coordinator {
            if coordinator.is_registered(id).await {
                coordinator.reinitialize(id).await?;
                return Ok(());
            }
        }
        ctx.component.initialize().await
    }
}

/// Drops the component's state back to empty. Matches
/// [`FailureKind::InvalidState`].
pub struct ResetStateStrategy {
    priority: i32,
}

impl ResetStateStrategy {
    pub fn new(priority: i32) -> Self {
        Self { priority }
    }
}

#[async_trait]
impl RecoveryStrategy for ResetStateStrategy {
    fn name(&self) -> &str {
        "reset_state"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn matches(&self, error: &ComponentErrorRecord) -> bool {
        error.kind == FailureKind::InvalidState
    }

    async fn recover(&self, ctx: &RecoveryContext) -> Result<(), BoxError> {
        if ctx.component.reset_state().await? {
            Ok(())
        } else {
            Err(ComponentFailure::invalid_state("component does not support resetting its state").into())
        }
    }
}

/// Asks the component to re-render, falling back to `update`. Matches
/// [`FailureKind::Render`].
pub struct RefreshStrategy {
    priority: i32,
}

impl RefreshStrategy {
    pub fn new(priority: i32) -> Self {
        Self { priority }
    }
}

#[async_trait]
impl RecoveryStrategy for RefreshStrategy {
    fn name(&self) -> &str {
        "refresh"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn matches(&self, error: &ComponentErrorRecord) -> bool {
        error.kind == FailureKind::Render
    }

    async fn recover(&self, ctx: &RecoveryContext) -> Result<(), BoxError> {
        if ctx.component.refresh().await? || ctx.component.update().await? {
            Ok(())
        } else {
            Err(ComponentFailure::render("component supports neither refresh nor update").into())
        }
    }
}

/// The built-in strategies with the configured priorities
pub fn default_strategies(priorities: &StrategyPriorities) -> Vec<Arc<dyn RecoveryStrategy>> {
    vec![
        Arc::new(ReinitializeStrategy::new(priorities.reinitialize)),
        Arc::new(ResetStateStrategy::new(priorities.reset_state)),
        Arc::new(RefreshStrategy::new(priorities.refresh)),
    ]
}

/// Insert keeping descending priority; equal priorities keep insertion order.
pub(crate) fn insert_by_priority(strategies: &mut Vec<Arc<dyn RecoveryStrategy>>, strategy: Arc<dyn RecoveryStrategy>) {
    let priority = strategy.priority();
    let position = strategies
        .iter()
        .position(|s| s.priority() < priority)
        .unwrap_or(strategies.len());
    strategies.insert(position, strategy);
}
