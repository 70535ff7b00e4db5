//! HTTP 响应辅助函数
//!
//! roomstatus 接口的错误体固定为 `{"error": "..."}`；运维接口使用 ApiResponse 封装。

use api_contract::{AUTHENTICATION_FAILED_MESSAGE, ErrorBody};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// 服务端内部错误的统一提示，不向客户端暴露细节。
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// `{"error": message}` 错误响应
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

/// 错误请求响应
pub fn bad_request(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

/// PSK 校验失败响应
pub fn authentication_failed() -> Response {
    error_response(StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED_MESSAGE)
}

/// 内部错误响应
pub fn internal_error() -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
}
