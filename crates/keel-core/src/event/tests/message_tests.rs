use serde_json::json;

use crate::event::message::{Message, MessageOptions};
use crate::event::Priority;

#[test]
fn test_builder_populates_metadata() {
    let message = Message::builder("map.updated")
        .payload(json!({"layer": "fires"}))
        .source("map")
        .priority(Priority::High)
        .tag("ui")
        .tag("ui")
        .build();

    assert_eq!(message.message_type(), "map.updated");
    assert_eq!(message.payload(), &json!({"layer": "fires"}));
    assert_eq!(message.source(), Some("map"));
    assert_eq!(message.priority(), Priority::High);
    assert_eq!(message.metadata().tags, vec!["ui".to_string()]);
    assert!(message.has_tag("ui"));
    assert!(message.correlation_id().is_none());
    assert!(!message.id().is_empty());
}

#[test]
fn test_repeated_tags_collapse_regardless_of_order() {
    let message = Message::builder("map.updated").tag("a").tag("b").tag("a").build();
    assert_eq!(message.metadata().tags, vec!["a".to_string(), "b".to_string()]);

    let options = MessageOptions::new().tag("x").tag("y").tag("x").tag("y");
    assert_eq!(options.tags, vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn test_message_ids_are_unique() {
    let a = Message::new("x", json!(null));
    let b = Message::new("x", json!(null));
    assert_ne!(a.id(), b.id());
}

#[test]
fn test_reply_links_correlation_id() {
    let request = Message::new("search.request", json!({"q": "station"}));
    let response = request.reply("search.response").payload(json!([1, 2])).build();
    assert_eq!(response.correlation_id(), Some(request.id()));

    // A reply to a reply keeps the original correlation id
    let followup = response.reply("search.followup").build();
    assert_eq!(followup.correlation_id(), Some(request.id()));
}

#[test]
fn test_with_payload_keeps_metadata() {
    let original = Message::builder("x").payload(json!(1)).source("a").build();
    let id = original.id().to_string();
    let changed = original.with_payload(json!(2)).with_tag("seen");
    assert_eq!(changed.id(), id);
    assert_eq!(changed.payload(), &json!(2));
    assert_eq!(changed.source(), Some("a"));
    assert!(changed.has_tag("seen"));
}

#[test]
fn test_options_builder() {
    let options = MessageOptions::new()
        .source("boundary")
        .priority(Priority::Critical)
        .correlation_id("abc")
        .tag("error");
    let message = Message::builder("x").options(options).build();
    assert_eq!(message.priority(), Priority::Critical);
    assert_eq!(message.correlation_id(), Some("abc"));
    assert_eq!(message.source(), Some("boundary"));
}

#[test]
fn test_message_serializes_with_type_field() {
    let message = Message::builder("component.ready").payload(json!({"id": "a"})).build();
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["type"], "component.ready");
    assert_eq!(value["metadata"]["priority"], "normal");
    assert!(value["metadata"]["correlationId"].is_null());

    let back: Message = serde_json::from_value(value).unwrap();
    assert_eq!(back, message);
}
