use async_trait::async_trait;

use crate::event::BoxError;

/// Capability contract every managed component implements.
///
/// Identity and dependencies are read once at registration. The lifecycle
/// hooks are driven by the [`LifecycleCoordinator`](crate::kernel::LifecycleCoordinator);
/// the optional hooks at the bottom are only invoked by the error boundary
/// and default to "unsupported".
#[async_trait]
pub trait Component: Send + Sync {
    /// Unique id within a coordinator
    fn id(&self) -> &str;

    /// Human readable name; defaults to the id
    fn name(&self) -> &str {
        self.id()
    }

    /// Free-form category label, e.g. "panel" or "service"
    fn component_type(&self) -> &str {
        "component"
    }

    /// Ids of the components that must be ready before this one initializes
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    async fn initialize(&self) -> Result<(), BoxError>;

    async fn cleanup(&self) -> Result<(), BoxError> {
        Ok(())
    }

    fn is_ready(&self) -> bool;

    fn is_healthy(&self) -> bool {
        self.is_ready()
    }

    /// Suppress the component's visible output. Returns false if the
    /// component has nothing to hide.
    fn hide(&self) -> bool {
        false
    }

    /// Re-render from current state. `Ok(false)` means unsupported.
    async fn refresh(&self) -> Result<bool, BoxError> {
        Ok(false)
    }

    /// Re-fetch or recompute state. `Ok(false)` means unsupported.
    async fn update(&self) -> Result<bool, BoxError> {
        Ok(false)
    }

    /// Drop internal state back to empty. `Ok(false)` means unsupported.
    async fn reset_state(&self) -> Result<bool, BoxError> {
        Ok(false)
    }
}
