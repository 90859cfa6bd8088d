use super::*;
use ksi_core::{Clock, ConnId, EventContext, FakeClock, KsiError, Originator};
use serde_json::json;

fn ctx() -> EventContext {
    EventContext::root(Originator::Connection(ConnId::new()), &FakeClock::new())
}

#[test]
fn server_message_distinguishes_response_from_notification() {
    let resp: ServerMessage = ResponseEnvelope::success(json!({"ok": true}), &ctx()).into();
    let json_str = serde_json::to_string(&resp).unwrap();
    let parsed: ServerMessage = serde_json::from_str(&json_str).unwrap();
    assert!(matches!(parsed, ServerMessage::Response(_)));
}

#[test]
fn server_message_roundtrips_notification() {
    let envelope = ksi_core::EventEnvelope::new("agent:status", json!({"state": "ready"}), ctx());
    let note = Notification::from_envelope(&envelope);
    let msg: ServerMessage = note.clone().into();
    let json_str = serde_json::to_string(&msg).unwrap();
    let parsed: ServerMessage = serde_json::from_str(&json_str).unwrap();
    match parsed {
        ServerMessage::Notification(n) => assert_eq!(n.event, "agent:status"),
        ServerMessage::Response(_) => panic!("expected notification"),
    }
}

#[test]
fn server_message_roundtrips_error_response() {
    let err = KsiError::not_found("agent missing");
    let msg: ServerMessage = ResponseEnvelope::error(err, Some(&ctx())).into();
    let json_str = serde_json::to_string(&msg).unwrap();
    let parsed: ServerMessage = serde_json::from_str(&json_str).unwrap();
    assert!(matches!(parsed, ServerMessage::Response(r) if !r.is_success()));
}
