//! 房间状态接口
//!
//! - GET   {base}/roomstatus：返回上报侧状态
//! - PATCH {base}/roomstatus：提交期望状态（仅 standard.state / standard.activity 可写）

use api_contract::PatchAcceptedResponse;
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{info, warn};
use udm_config::FeedbackMode;
use udm_router::{RouterError, parse_patch_request};

use crate::AppState;
use crate::middleware::validate_request_headers;
use crate::utils::response::{bad_request, internal_error};

pub async fn get_room_status(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = validate_request_headers(&state.configuration, &headers) {
        return response;
    }
    let reported = state.router.reported();
    (StatusCode::OK, Json(reported.as_ref().clone())).into_response()
}

pub async fn patch_room_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = validate_request_headers(&state.configuration, &headers) {
        return response;
    }

    let patch = match parse_patch_request(&body) {
        Ok(patch) => patch,
        Err(err) => {
            warn!(target: "udm.api", error = %err, "patch_request_invalid");
            return bad_request(err.to_string());
        }
    };

    match state.router.apply_desired_patch(patch).await {
        Ok(outcome) => {
            info!(
                target: "udm.api",
                written = outcome.written.len(),
                changed = outcome.diff.len(),
                actuations = outcome.actuations.len(),
                "patch_request_accepted"
            );
        }
        Err(RouterError::Rejected(err)) => {
            warn!(target: "udm.api", error = %err, "patch_request_rejected");
            return bad_request(err.to_string());
        }
        Err(RouterError::Closed) => {
            warn!(target: "udm.api", "router_unavailable");
            return internal_error();
        }
    }

    match state.router.feedback_mode() {
        FeedbackMode::Immediate => {
            let reported = state.router.reported();
            (StatusCode::OK, Json(reported.as_ref().clone())).into_response()
        }
        FeedbackMode::Deferred => (
            StatusCode::ACCEPTED,
            Json(PatchAcceptedResponse::default()),
        )
            .into_response(),
    }
}
