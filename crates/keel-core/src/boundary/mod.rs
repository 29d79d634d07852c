//! # Keel Error Boundary
//!
//! Fault containment for managed components.
//!
//! Failures reach the [`ErrorBoundary`] either through a [`GuardedComponent`]
//! (hooks and emissions of a wrapped component) or through a direct
//! [`ErrorBoundary::handle_error`] call. Each failure is classified into a
//! [`FailureKind`], recorded, and answered with at most one recovery attempt
//! by the first matching [`RecoveryStrategy`]. Components that fail too often,
//! either over their lifetime or within a short window, are isolated.
//!
//! Components report categorised failures by returning a [`ComponentFailure`]
//! from their hooks; any other error is treated as [`FailureKind::Unknown`]
//! and matches no built-in strategy.
pub mod error;
pub mod failure;
pub mod guard;
pub mod manager;
pub mod stats;
pub mod strategy;

pub use error::BoundaryError;
pub use failure::{classify, ComponentErrorRecord, ComponentFailure, ErrorContext, ErrorPhase, FailureKind};
pub use guard::GuardedComponent;
pub use manager::ErrorBoundary;
pub use stats::ErrorStatistics;
pub use strategy::{
    default_strategies, RecoveryContext, RecoveryStrategy, RefreshStrategy, ReinitializeStrategy, ResetStateStrategy,
};
