use super::*;

#[test]
fn request_defaults_missing_data_to_empty_object() {
    let req: ClientRequest = serde_json::from_str(r#"{"name":"agent:spawn"}"#).unwrap();
    assert_eq!(req.name, "agent:spawn");
    assert_eq!(req.data, serde_json::json!({}));
}

#[test]
fn request_round_trips_through_json() {
    let req = ClientRequest::new("agent:spawn", serde_json::json!({"profile": "standard"}));
    let json = serde_json::to_string(&req).unwrap();
    let back: ClientRequest = serde_json::from_str(&json).unwrap();
    assert_eq!(req, back);
}
