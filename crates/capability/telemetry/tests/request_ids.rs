use udm_telemetry::{metrics, new_request_ids, record_pending_discarded, record_patch_accepted};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_patch_accepted();
    record_pending_discarded(3);
    let after = metrics().snapshot();
    assert!(after.patches_accepted >= before.patches_accepted + 1);
    assert!(after.pending_discarded >= before.pending_discarded + 3);
}
