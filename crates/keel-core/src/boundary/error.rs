//! # Keel Error Boundary Errors
//!
//! Errors raised by the boundary itself. None of them escape `handle_error`;
//! they are logged and published as `boundary.*` messages.
use thiserror::Error;

use crate::event::BoxError;

#[derive(Debug, Error)]
pub enum BoundaryError {
    /// A recovery strategy failed or panicked. Counted as a failed attempt.
    #[error("Recovery strategy '{strategy}' failed for '{component_id}': {message}")]
    Recovery {
        strategy: String,
        component_id: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("No recovery strategy matches the last error of '{component_id}'")]
    NoStrategy { component_id: String },

    #[error("Component '{component_id}' is unknown to the error boundary")]
    UnknownComponent { component_id: String },

    #[error("Component '{component_id}' cannot be isolated: {reason}")]
    NotIsolatable { component_id: String, reason: String },
}

impl BoundaryError {
    pub fn component_id(&self) -> &str {
        match self {
            BoundaryError::Recovery { component_id, .. }
            | BoundaryError::NoStrategy { component_id }
            | BoundaryError::UnknownComponent { component_id }
            | BoundaryError::NotIsolatable { component_id, .. } => component_id,
        }
    }
}
