use domain::{
    CustomField, DeviceProperty, FieldKind, FieldPath, FieldValue, StandardField, State,
    WriteError,
};

#[test]
fn default_state_has_twenty_slots_each() {
    let state = State::with_default_slots("1.0.0");
    assert_eq!(state.status.devices.len(), 20);
    assert_eq!(state.custom.len(), 20);
    assert!(state.device(20).is_some());
    assert!(state.device(21).is_none());
    assert!(state.device(0).is_none());
}

#[test]
fn set_reports_change_only_when_value_differs() {
    let mut state = State::with_default_slots("1.0.0");
    let path = FieldPath::device(3, DeviceProperty::Status);

    assert!(state.set(&path, FieldValue::text("OK")).expect("first write"));
    assert!(!state.set(&path, FieldValue::text("OK")).expect("same write"));
    assert_eq!(state.get(&path), Some(FieldValue::text("OK")));
    assert_eq!(state.device(3).expect("slot 3").status, "OK");
}

#[test]
fn set_rejects_out_of_range_and_wrong_kind() {
    let mut state = State::new("1.0.0", 4, 2);

    let err = state
        .set(&FieldPath::device(5, DeviceProperty::Label), FieldValue::text("x"))
        .expect_err("slot 5 out of range");
    assert!(matches!(err, WriteError::OutOfRange { .. }));

    let err = state
        .set(
            &FieldPath::Standard(StandardField::Occupancy),
            FieldValue::text("yes"),
        )
        .expect_err("occupancy is a flag");
    assert_eq!(
        err,
        WriteError::KindMismatch {
            path: FieldPath::Standard(StandardField::Occupancy),
            expected: FieldKind::Flag,
            found: FieldKind::Text,
        }
    );

    let err = state
        .set(&FieldPath::custom(3, CustomField::Value), FieldValue::text("v"))
        .expect_err("custom slot 3 out of range");
    assert!(matches!(err, WriteError::OutOfRange { .. }));
}

#[test]
fn fingerprint_tracks_structural_equality() {
    let mut left = State::with_default_slots("1.0.0");
    let right = State::with_default_slots("1.0.0");
    assert_eq!(left.fingerprint(), right.fingerprint());

    left.set(
        &FieldPath::device(1, DeviceProperty::Usage),
        FieldValue::Count(12),
    )
    .expect("usage write");
    assert_ne!(left.fingerprint(), right.fingerprint());
}

#[test]
fn serializes_with_wire_keys() {
    let mut state = State::new("1.0.0", 2, 1);
    state
        .set(
            &FieldPath::device(2, DeviceProperty::VideoSource),
            FieldValue::text("HDMI 1"),
        )
        .expect("video source");
    state
        .set(&FieldPath::custom(1, CustomField::Label), FieldValue::text("Temp"))
        .expect("custom label");

    let json = serde_json::to_value(&state).expect("serialize");
    assert_eq!(json["apiVersion"], "1.0.0");
    assert_eq!(json["standard"]["occupancy"], false);
    assert_eq!(json["standard"]["helpRequest"], "");
    assert_eq!(json["status"]["devices"]["device2"]["videoSource"], "HDMI 1");
    assert_eq!(json["status"]["devices"]["device1"]["usage"], 0);
    assert_eq!(json["custom"]["property1"]["label"], "Temp");
    assert!(json["status"]["devices"].get("device3").is_none());
}
