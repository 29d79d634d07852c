use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::event::error::EventChannelError;
use crate::event::BoxError;

/// Category of a component failure, used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A collaborator or value the component relies on is absent
    MissingReference,
    /// Internal state became inconsistent
    InvalidState,
    /// Producing visible output failed
    Render,
    Timeout,
    Network,
    #[default]
    Unknown,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::MissingReference => "missing_reference",
            FailureKind::InvalidState => "invalid_state",
            FailureKind::Render => "render",
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Categorised error a component returns from its hooks so the boundary can
/// choose a matching recovery strategy.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct ComponentFailure {
    pub kind: FailureKind,
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl ComponentFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), source: None }
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn missing_reference(message: impl Into<String>) -> Self {
        Self::new(FailureKind::MissingReference, message)
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidState, message)
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Render, message)
    }
}

/// Determine the category of an arbitrary error.
///
/// Walks the source chain looking for a [`ComponentFailure`] or a listener
/// timeout; anything else is [`FailureKind::Unknown`].
pub fn classify(error: &(dyn StdError + 'static)) -> FailureKind {
    let mut current: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = current {
        if let Some(failure) = err.downcast_ref::<ComponentFailure>() {
            return failure.kind;
        }
        if let Some(channel_err) = err.downcast_ref::<EventChannelError>() {
            if channel_err.is_timeout() {
                return FailureKind::Timeout;
            }
        }
        if err.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
            return FailureKind::Timeout;
        }
        current = err.source();
    }
    FailureKind::Unknown
}

/// Where a failure was intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPhase {
    Initialize,
    Cleanup,
    /// Publishing a message on behalf of the component
    Emit,
    /// Inside one of the component's listeners
    Listener,
    #[default]
    Runtime,
}

impl ErrorPhase {
    /// Phases whose failures the lifecycle coordinator already accounts for
    pub(crate) fn is_lifecycle(self) -> bool {
        matches!(self, ErrorPhase::Initialize | ErrorPhase::Cleanup)
    }
}

impl fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorPhase::Initialize => "initialize",
            ErrorPhase::Cleanup => "cleanup",
            ErrorPhase::Emit => "emit",
            ErrorPhase::Listener => "listener",
            ErrorPhase::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorContext {
    pub phase: ErrorPhase,
    /// Free-form detail, e.g. the message type being emitted
    pub detail: Option<String>,
}

impl ErrorContext {
    pub fn new(phase: ErrorPhase) -> Self {
        Self { phase, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<ErrorPhase> for ErrorContext {
    fn from(phase: ErrorPhase) -> Self {
        Self::new(phase)
    }
}

/// One captured failure of a managed component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentErrorRecord {
    pub id: String,
    pub component_id: String,
    pub error: String,
    pub kind: FailureKind,
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
    pub recovery_attempts: u32,
    pub is_recovered: bool,
}

impl ComponentErrorRecord {
    pub fn new(component_id: &str, error: &(dyn StdError + 'static), context: ErrorContext) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            component_id: component_id.to_string(),
            error: error.to_string(),
            kind: classify(error),
            context,
            timestamp: Utc::now(),
            recovery_attempts: 0,
            is_recovered: false,
        }
    }
}
