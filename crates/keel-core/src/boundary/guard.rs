use std::error::Error as StdError;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::boundary::failure::{ComponentFailure, ErrorContext, ErrorPhase, FailureKind};
use crate::boundary::manager::WeakBoundary;
use crate::event::{BoxError, MessageOptions};
use crate::kernel::component::Component;
use crate::utils::panic_message;

/// A component whose failures are captured by an
/// [`ErrorBoundary`](crate::boundary::ErrorBoundary).
///
/// Created by [`ErrorBoundary::wrap`](crate::boundary::ErrorBoundary::wrap).
/// Initialize failures are captured and still returned, since the
/// coordinator needs them; cleanup failures are captured and swallowed.
pub struct GuardedComponent {
    inner: Arc<dyn Component>,
    boundary: WeakBoundary,
}

impl GuardedComponent {
    pub(crate) fn new(inner: Arc<dyn Component>, boundary: WeakBoundary) -> Self {
        Self { inner, boundary }
    }

    pub fn inner(&self) -> &Arc<dyn Component> {
        &self.inner
    }

    pub fn is_isolated(&self) -> bool {
        self.boundary
            .upgrade()
            .is_some_and(|b| b.is_isolated(self.inner.id()))
    }

    /// Publish a message on behalf of the component.
    ///
    /// Suppressed while the component is isolated. A publish failure is
    /// handed to the boundary instead of being returned.
    pub async fn emit<P: Serialize>(&self, message_type: &str, payload: P) -> Vec<Value> {
        self.emit_with(message_type, payload, MessageOptions::new()).await
    }

    /// [`emit`](Self::emit) with explicit metadata. The source is always the
    /// component id.
    pub async fn emit_with<P: Serialize>(&self, message_type: &str, payload: P, options: MessageOptions) -> Vec<Value> {
        let Some(boundary) = self.boundary.upgrade() else {
            log::warn!("Error boundary of '{}' is gone; dropping '{}'", self.inner.id(), message_type);
            return Vec::new();
        };
        if boundary.is_isolated(self.inner.id()) {
            log::debug!("Suppressed '{}' from isolated component '{}'", message_type, self.inner.id());
            return Vec::new();
        }
        let options = options.source(self.inner.id());
        match boundary.channel().publish_with(message_type, payload, options).await {
            Ok(results) => results,
            Err(e) => {
                let context = ErrorContext::new(ErrorPhase::Emit).with_detail(message_type);
                boundary.handle_error(&self.inner, &e, context).await;
                Vec::new()
            }
        }
    }

    /// Report a failure raised outside the lifecycle hooks
    pub async fn report_error(&self, error: &(dyn StdError + Send + Sync + 'static), context: ErrorContext) {
        self.capture(error, context).await;
    }

    async fn capture(&self, error: &(dyn StdError + Send + Sync + 'static), context: ErrorContext) {
        match self.boundary.upgrade() {
            Some(boundary) => {
                boundary.handle_error(&self.inner, error, context).await;
            }
            None => log::error!(
                "Uncaptured failure of '{}' during {}: {}",
                self.inner.id(),
                context.phase,
                error
            ),
        }
    }

    async fn guarded<T: Send>(
        &self,
        phase: ErrorPhase,
        hook: impl std::future::Future<Output = Result<T, BoxError>> + Send,
    ) -> Result<T, BoxError> {
        match AssertUnwindSafe(hook).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.capture(&*e, ErrorContext::new(phase)).await;
                Err(e)
            }
            Err(payload) => {
                let failure = ComponentFailure::new(
                    FailureKind::Unknown,
                    format!("{} panicked: {}", phase, panic_message(payload)),
                );
                self.capture(&failure, ErrorContext::new(phase)).await;
                Err(failure.into())
            }
        }
    }
}

impl fmt::Debug for GuardedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedComponent")
            .field("id", &self.inner.id())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Component for GuardedComponent {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn component_type(&self) -> &str {
        self.inner.component_type()
    }

    fn dependencies(&self) -> Vec<String> {
        self.inner.dependencies()
    }

    async fn initialize(&self) -> Result<(), BoxError> {
        self.guarded(ErrorPhase::Initialize, self.inner.initialize()).await
    }

    async fn cleanup(&self) -> Result<(), BoxError> {
        // Captured by the boundary; destruction proceeds regardless
        let _ = self.guarded(ErrorPhase::Cleanup, self.inner.cleanup()).await;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn is_healthy(&self) -> bool {
        !self.is_isolated() && self.inner.is_healthy()
    }

    fn hide(&self) -> bool {
        self.inner.hide()
    }

    async fn refresh(&self) -> Result<bool, BoxError> {
        self.inner.refresh().await
    }

    async fn update(&self) -> Result<bool, BoxError> {
        self.inner.update().await
    }

    async fn reset_state(&self) -> Result<bool, BoxError> {
        self.inner.reset_state().await
    }
}
