//! # Keel Kernel Errors
//!
//! Defines the crate-level [`Error`] type.
//!
//! Each subsystem keeps its own typed error ([`EventChannelError`],
//! [`BoundaryError`], [`ConfigError`]) which converts into [`Error`] with `?`.
//! Lifecycle and dependency-graph failures are expressed directly here.
use std::fmt;
use std::result::Result as StdResult;

use thiserror::Error as ThisError;

use crate::boundary::error::BoundaryError;
use crate::config::ConfigError;
use crate::event::error::EventChannelError;
use crate::event::BoxError;
use crate::kernel::record::ComponentStatus;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("Event channel error: {0}")]
    EventChannel(#[from] EventChannelError),

    #[error("Error boundary error: {0}")]
    Boundary(#[from] BoundaryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The component could not be accepted by the registry
    #[error("Cannot register component '{component_id}': {reason}")]
    Registration { component_id: String, reason: String },

    #[error("Component '{component_id}' is not registered")]
    NotRegistered { component_id: String },

    #[error("Component '{component_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        component_id: String,
        from: ComponentStatus,
        to: ComponentStatus,
    },

    /// A component hook failed during a lifecycle phase.
    #[error("Lifecycle error during {phase} of '{component_id}': {message}")]
    Lifecycle {
        phase: LifecyclePhase,
        component_id: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The dependency graph contains a cycle through `component_id`.
    #[error("Circular dependency detected at '{component_id}': {}", path.join(" -> "))]
    Cycle { component_id: String, path: Vec<String> },

    #[error("Error: {0}")]
    Other(String),
}

/// Phase of the component lifecycle an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Register,
    Initialize,
    Cleanup,
    HealthCheck,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecyclePhase::Register => "Register",
            LifecyclePhase::Initialize => "Initialize",
            LifecyclePhase::Cleanup => "Cleanup",
            LifecyclePhase::HealthCheck => "HealthCheck",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Id of the component the error concerns, if any
    pub fn component_id(&self) -> Option<&str> {
        match self {
            Error::Registration { component_id, .. }
            | Error::NotRegistered { component_id }
            | Error::InvalidTransition { component_id, .. }
            | Error::Lifecycle { component_id, .. }
            | Error::Cycle { component_id, .. } => Some(component_id),
            _ => None,
        }
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Error::Cycle { .. })
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;
