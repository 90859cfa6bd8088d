use super::*;
use crate::clock::FakeClock;
use crate::context::Originator;
use crate::error::ErrorCode;
use crate::ids::ConnId;
use serde_json::json;

fn ctx() -> EventContext {
    EventContext::root(Originator::Connection(ConnId::new()), &FakeClock::new())
}

#[test]
fn success_response_serializes_with_success_tag() {
    let ctx = ctx();
    let resp = ResponseEnvelope::success(json!({"x": 1}), &ctx);
    let v = serde_json::to_value(&resp).unwrap();
    assert_eq!(v["status"], "success");
    assert_eq!(v["result"]["x"], 1);
    assert_eq!(v["correlation_id"], ctx.correlation_id.to_string());
}

#[test]
fn error_response_serializes_with_error_tag() {
    let err = KsiError::new(ErrorCode::NotFound, "missing");
    let resp = ResponseEnvelope::error(err, None);
    let v = serde_json::to_value(&resp).unwrap();
    assert_eq!(v["status"], "error");
    assert_eq!(v["error"]["code"], "NOT_FOUND");
    assert!(v.get("correlation_id").is_none() || v["correlation_id"].is_null());
}

#[test]
fn notification_carries_event_name_alongside_response_shape() {
    let envelope = EventEnvelope::new("foo:bar", json!({"x": 1}), ctx());
    let note = Notification::from_envelope(&envelope);
    assert_eq!(note.event, "foo:bar");
    assert_eq!(note.data["x"], 1);
}

#[test]
fn event_envelope_defaults_missing_data_to_empty_object() {
    let ctx = ctx();
    let json = serde_json::json!({"name": "foo:bar", "context": ctx}).to_string();
    let envelope: EventEnvelope = serde_json::from_str(&json).unwrap();
    assert_eq!(envelope.data, json!({}));
}

#[test]
fn event_envelope_missing_context_fails_to_parse() {
    let json = r#"{"name":"foo:bar"}"#;
    assert!(serde_json::from_str::<EventEnvelope>(json).is_err());
}
