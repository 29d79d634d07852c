use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::event::message::Message;

/// One entry in the channel's in-memory diagnostic buffer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub message_type: String,
    pub recorded_at: DateTime<Utc>,
    /// The delivered message; `None` when publish input was rejected
    pub message: Option<Arc<Message>>,
    pub listeners_invoked: usize,
    pub failures: usize,
    /// Validation reason for rejected publishes
    pub error: Option<String>,
}

impl HistoryEntry {
    pub fn is_rejected(&self) -> bool {
        self.message.is_none()
    }
}

/// Bounded ring of recent [`HistoryEntry`] values. Capacity 0 disables it.
#[derive(Debug)]
pub(crate) struct DiagnosticBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl DiagnosticBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
