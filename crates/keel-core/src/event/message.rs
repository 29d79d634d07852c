use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event::Priority;

/// Metadata attached to every message when it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub source: Option<String>,
    pub priority: Priority,
    /// Links a response to the request it answers
    pub correlation_id: Option<String>,
    pub tags: Vec<String>,
}

/// A typed, timestamped unit of communication.
///
/// Messages are immutable once built; the `with_*` methods consume the
/// message and return a new one carrying the same metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    message_type: String,
    payload: Value,
    metadata: MessageMetadata,
}

impl Message {
    /// Build a message with default metadata
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self::builder(message_type).payload(payload).build()
    }

    pub fn builder(message_type: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(message_type)
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn metadata(&self) -> &MessageMetadata {
        &self.metadata
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn priority(&self) -> Priority {
        self.metadata.priority
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.source.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.correlation_id.as_deref()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.tags.iter().any(|t| t == tag)
    }

    /// Start a response to this message. The response shares this message's
    /// correlation id, or uses this message's id when it has none.
    pub fn reply(&self, message_type: impl Into<String>) -> MessageBuilder {
        let correlation = self
            .metadata
            .correlation_id
            .clone()
            .unwrap_or_else(|| self.metadata.id.clone());
        MessageBuilder::new(message_type).correlation_id(correlation)
    }

    /// Same message with a replaced payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Same message with one more tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.metadata.tags.contains(&tag) {
            self.metadata.tags.push(tag);
        }
        self
    }

    pub fn into_parts(self) -> (String, Value, MessageMetadata) {
        (self.message_type, self.payload, self.metadata)
    }
}

/// Publish-time metadata supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageOptions {
    pub source: Option<String>,
    pub priority: Priority,
    pub correlation_id: Option<String>,
    pub tags: Vec<String>,
}

impl MessageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }
}

/// Builder for [`Message`]
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    message_type: String,
    payload: Value,
    options: MessageOptions,
}

impl MessageBuilder {
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            payload: Value::Null,
            options: MessageOptions::default(),
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn options(mut self, options: MessageOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.options = self.options.source(source);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.options = self.options.priority(priority);
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.options = self.options.correlation_id(id);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.options = self.options.tag(tag);
        self
    }

    pub fn build(self) -> Message {
        let MessageOptions { source, priority, correlation_id, tags } = self.options;
        Message {
            message_type: self.message_type,
            payload: self.payload,
            metadata: MessageMetadata {
                id: Uuid::new_v4().to_string(),
                timestamp: Utc::now(),
                source,
                priority,
                correlation_id,
                tags,
            },
        }
    }
}
