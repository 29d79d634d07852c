//! # Keel Core
//!
//! A component-orchestration kernel: typed publish/subscribe messaging,
//! dependency-ordered lifecycle management and fault isolation for
//! independently developed application components.
//!
//! - [`event`]: the [`EventChannel`] with ordered delivery and middleware.
//! - [`kernel`]: the [`Component`] contract, the [`LifecycleCoordinator`]
//!   and the [`Kernel`] bootstrap.
//! - [`boundary`]: the [`ErrorBoundary`] and its recovery strategies.
//! - [`config`]: [`KernelConfig`], loadable from JSON, TOML or YAML.
pub mod boundary;
pub mod config;
pub mod event;
pub mod kernel;
pub(crate) mod utils;

pub use boundary::{ComponentFailure, ErrorBoundary, ErrorContext, ErrorPhase, FailureKind, GuardedComponent};
pub use config::KernelConfig;
pub use event::{BoxError, EventChannel, Message, Priority, SubscribeOptions};
pub use kernel::error::Error as KernelError;
pub use kernel::{Component, Kernel, LifecycleCoordinator};

#[cfg(test)]
mod tests;
