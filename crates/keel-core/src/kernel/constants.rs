/// Kernel name
pub const KERNEL_NAME: &str = "Keel";

/// Kernel version
pub const KERNEL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default capacity of the event channel's diagnostic buffer
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Default interval between health checks
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;

/// Lifetime error count a component may reach before it is isolated
pub const DEFAULT_MAX_ERRORS_PER_COMPONENT: u64 = 10;

/// Length of the trailing error window
pub const DEFAULT_ERROR_WINDOW_MS: u64 = 60_000;

/// Errors a component may raise inside one window before it is isolated
pub const DEFAULT_MAX_ERRORS_PER_WINDOW: usize = 5;

/// Error records kept per component
pub const DEFAULT_MAX_HISTORY_PER_COMPONENT: usize = 50;

pub const REINITIALIZE_STRATEGY_PRIORITY: i32 = 30;
pub const RESET_STATE_STRATEGY_PRIORITY: i32 = 20;
pub const REFRESH_STRATEGY_PRIORITY: i32 = 10;

/// Source label attached to messages emitted by the lifecycle coordinator
pub const LIFECYCLE_SOURCE: &str = "lifecycle";

/// Source label attached to messages emitted by the error boundary
pub const BOUNDARY_SOURCE: &str = "boundary";
