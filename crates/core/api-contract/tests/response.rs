use api_contract::{
    ApiResponse, ErrorBody, MetricsSnapshotDto, PatchAcceptedResponse, ReportedUpdateRequest,
};
use serde_json::json;

#[test]
fn api_response_success() {
    let response = ApiResponse::success("ok");
    assert!(response.success);
    assert!(response.data.is_some());

    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value, json!({"success": true, "data": "ok"}));
}

#[test]
fn error_and_accepted_bodies_match_wire_shape() {
    let value = serde_json::to_value(ErrorBody::new("Authentication failed")).expect("serialize");
    assert_eq!(value, json!({"error": "Authentication failed"}));

    let value = serde_json::to_value(PatchAcceptedResponse::default()).expect("serialize");
    assert_eq!(value, json!({"message": "State change accepted"}));
}

#[test]
fn reported_update_request_distinguishes_shapes() {
    let payload = json!([
        {"deviceIndex": 3, "property": "status", "value": "OK"},
        {"customIndex": 2, "field": "value", "value": "21C"},
        {"standard": "occupancy", "value": true},
        {"deviceKey": "room-mic", "property": "power", "value": "on"},
        {"deviceKey": "room-mic", "property": "power"}
    ]);
    let updates: Vec<ReportedUpdateRequest> = serde_json::from_value(payload).expect("parse");

    assert!(matches!(
        &updates[0],
        ReportedUpdateRequest::Device { device_index: 3, .. }
    ));
    assert!(matches!(
        &updates[1],
        ReportedUpdateRequest::Custom { custom_index: 2, .. }
    ));
    assert!(matches!(&updates[2], ReportedUpdateRequest::Standard { .. }));
    assert_eq!(
        updates[3],
        ReportedUpdateRequest::Keyed {
            device_key: "room-mic".to_string(),
            property: "power".to_string(),
            value: Some("on".to_string()),
        }
    );
    assert!(matches!(
        &updates[4],
        ReportedUpdateRequest::Keyed { value: None, .. }
    ));
}

#[test]
fn metrics_snapshot_is_camel_case() {
    let dto = MetricsSnapshotDto {
        patches_accepted: 1,
        patches_rejected: 0,
        reported_updates: 2,
        reported_changes: 2,
        dropped_invalid_index: 0,
        dropped_unknown_key: 0,
        reports_emitted: 1,
        desired_events: 1,
        actuations: 0,
        pending_discarded: 0,
    };
    let value = serde_json::to_value(dto).expect("serialize");
    assert!(value.get("patchesAccepted").is_some());
    assert!(value.get("droppedInvalidIndex").is_some());
    assert!(value.get("patches_accepted").is_none());
}
