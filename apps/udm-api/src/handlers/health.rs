//! 健康检查
//!
//! - GET /health

use api_contract::{ApiResponse, HealthDto};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Response {
    let dto = HealthDto {
        status: "ok".to_string(),
        api_version: state.configuration.api_version.clone(),
        feedback_mode: state.router.feedback_mode().to_string(),
    };
    (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
}
