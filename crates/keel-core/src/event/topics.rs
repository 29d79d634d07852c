//! Well-known message types emitted by the kernel itself.

/// Synthetic message re-emitting a listener failure.
pub const LISTENER_ERROR: &str = "channel.listener_error";
/// Diagnostic recorded (not delivered) when publish input is rejected.
pub const VALIDATION_ERROR: &str = "channel.validation_error";

pub const COMPONENT_REGISTERED: &str = "component.registered";
pub const COMPONENT_INITIALIZING: &str = "component.initializing";
pub const COMPONENT_READY: &str = "component.ready";
pub const COMPONENT_ERROR: &str = "component.error";
pub const COMPONENT_DESTROYED: &str = "component.destroyed";
pub const COMPONENT_UNREGISTERED: &str = "component.unregistered";
/// Every pending component settled successfully during `initialize_all`.
pub const LIFECYCLE_INITIALIZED: &str = "lifecycle.initialized";
/// One batched health report per monitoring tick.
pub const HEALTH_REPORT: &str = "health.report";

pub const BOUNDARY_ERROR: &str = "boundary.error";
pub const BOUNDARY_RECOVERED: &str = "boundary.recovered";
pub const BOUNDARY_RECOVERY_FAILED: &str = "boundary.recovery_failed";
pub const BOUNDARY_ISOLATED: &str = "boundary.isolated";
pub const BOUNDARY_RELEASED: &str = "boundary.released";
