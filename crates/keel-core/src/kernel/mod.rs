//! # Keel Kernel
//!
//! Component registry and lifecycle coordination.
//!
//! ## Key Responsibilities & Components:
//!
//! - **Component contract**: the [`Component`] trait every managed unit
//!   implements.
//! - **Dependency graph**: [`DependencyGraph`] keeps forward and reverse edges
//!   and computes the topological initialization order, rejecting cycles.
//! - **Lifecycle coordination**: [`LifecycleCoordinator`] moves components
//!   through `registered -> initializing -> ready | error -> destroyed`,
//!   publishes every transition on the event channel and polls health.
//! - **Bootstrapping**: [`Kernel`] wires a channel, a coordinator and an error
//!   boundary together from a [`KernelConfig`](crate::config::KernelConfig).
//! - **Errors**: the crate-level [`Error`] and `Result` alias.
pub mod bootstrap;
pub mod component;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod health;
pub mod record;

pub use bootstrap::Kernel;
pub use component::Component;
pub use coordinator::{DependencyValidation, DestroyReport, LifecycleCoordinator};
pub use error::{Error, LifecyclePhase, Result};
pub use graph::DependencyGraph;
pub use health::{ComponentHealth, HealthReport};
pub use record::{ComponentRecord, ComponentStatus, HealthStatus};
