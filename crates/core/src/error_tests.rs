use super::*;

#[test]
fn error_code_round_trips_through_json() {
    let json = serde_json::to_string(&ErrorCode::PermissionDenied).unwrap();
    assert_eq!(json, "\"PERMISSION_DENIED\"");
    let back: ErrorCode = serde_json::from_str(&json).unwrap();
    assert_eq!(back.as_str(), "PERMISSION_DENIED");
}

#[test]
fn ksi_error_serializes_without_details_when_absent() {
    let err = KsiError::not_found("agent missing");
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["code"], "NOT_FOUND");
    assert_eq!(v["message"], "agent missing");
    assert!(v.get("details").is_none());
}

#[test]
fn ksi_error_with_details_includes_them() {
    let err = KsiError::bad_request("malformed").with_details("line 3");
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["details"], "line 3");
}
