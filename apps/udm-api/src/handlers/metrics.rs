//! Telemetry 指标快照。
//!
//! - GET /metrics

use api_contract::{ApiResponse, MetricsSnapshotDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use udm_telemetry::metrics;

pub async fn get_metrics() -> Response {
    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsSnapshotDto {
            patches_accepted: snapshot.patches_accepted,
            patches_rejected: snapshot.patches_rejected,
            reported_updates: snapshot.reported_updates,
            reported_changes: snapshot.reported_changes,
            dropped_invalid_index: snapshot.dropped_invalid_index,
            dropped_unknown_key: snapshot.dropped_unknown_key,
            reports_emitted: snapshot.reports_emitted,
            desired_events: snapshot.desired_events,
            actuations: snapshot.actuations,
            pending_discarded: snapshot.pending_discarded,
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::body_json;

    #[tokio::test]
    async fn metrics_are_wrapped_in_api_response() {
        udm_telemetry::record_patch_accepted();
        let response = get_metrics().await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body["data"]["patchesAccepted"].as_u64().expect("counter") >= 1);
    }
}
