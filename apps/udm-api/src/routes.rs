//! 路由定义
//!
//! - 房间状态：`{base}[/{prefix}]/roomstatus`（GET / PATCH）
//! - 本地上报：`{base}[/{prefix}]/reports`（POST）
//! - 运维：`/health`、`/metrics`

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// 房间状态接口的挂载路径，例如 `/app01/udmcws/room1`。
pub fn room_path(base_path: &str, route_prefix: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let prefix = route_prefix.trim_matches('/');
    if prefix.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, prefix)
    }
}

/// 房间状态相关路由（相对挂载路径）。
pub fn create_room_router() -> Router<AppState> {
    Router::new()
        .route("/roomstatus", get(get_room_status).patch(patch_room_status))
        .route("/reports", post(post_reports))
}

/// 完整应用：房间路由嵌套在挂载路径下，外层统一注入请求上下文。
pub fn create_app(base_path: &str, state: AppState) -> Router {
    let mount = room_path(base_path, &state.configuration.route_prefix);
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .nest(&mount, create_room_router())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_context))
                .layer(TraceLayer::new_for_http()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{app_state, body_json};
    use api_contract::HEADER_PSK;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use tower::ServiceExt;
    use udm_config::FeedbackMode;

    #[test]
    fn room_path_joins_prefix() {
        assert_eq!(room_path("/app01/udmcws", ""), "/app01/udmcws");
        assert_eq!(room_path("/app01/udmcws", "/room1/"), "/app01/udmcws/room1");
    }

    #[tokio::test]
    async fn roomstatus_is_mounted_under_base_path() {
        let (_router, state) = app_state(FeedbackMode::Deferred, "");
        let app = create_app("/app07/udmcws", state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/app07/udmcws/roomstatus")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert!(response.headers().contains_key("x-trace-id"));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/app01/udmcws/roomstatus")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn post_reports_request(psk: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/app01/udmcws/reports")
            .header("content-type", "application/json");
        if let Some(psk) = psk {
            builder = builder.header(HEADER_PSK, psk);
        }
        builder.body(Body::from(body)).expect("request")
    }

    #[tokio::test]
    async fn reports_check_psk_before_parsing_body() {
        let (_router, state) = app_state(FeedbackMode::Deferred, "s3cret");
        let app = create_app("/app01/udmcws", state);

        for body in ["not json", r#"[{"bogus":1}]"#] {
            let response = app
                .clone()
                .oneshot(post_reports_request(None, body))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn malformed_reports_get_json_error_body() {
        let (_router, state) = app_state(FeedbackMode::Deferred, "s3cret");
        let app = create_app("/app01/udmcws", state);

        for body in ["not json", r#"[{"bogus":1}]"#] {
            let response = app
                .clone()
                .oneshot(post_reports_request(Some("s3cret"), body))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let json = body_json(response).await;
            assert!(json["error"].is_string(), "unexpected error body {json}");
        }

        let response = app
            .oneshot(post_reports_request(
                Some("s3cret"),
                r#"[{"deviceIndex":1,"property":"status","value":"OK"}]"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
