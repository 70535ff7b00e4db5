//! 请求上下文与接口校验
//!
//! - request_context：注入 request_id/trace_id
//! - require_psk：配置了 PSK 时校验 `PDT-PSK`（常量时间比较）
//! - check_api_version：`PDT-API-VERSION` 缺失或不一致时仅告警

use api_contract::{HEADER_API_VERSION, HEADER_PSK};
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::{Instrument, info_span, warn};
use udm_config::UdmCwsConfiguration;
use udm_telemetry::new_request_ids;

use crate::utils::response::authentication_failed;

/// 请求上下文中间件：注入 request_id/trace_id
pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// 校验请求头：API 版本只告警，PSK 不匹配返回 401。
pub fn validate_request_headers(
    configuration: &UdmCwsConfiguration,
    headers: &HeaderMap,
) -> Result<(), Response> {
    check_api_version(&configuration.api_version, headers);
    require_psk(&configuration.psk, headers)
}

/// API 版本检查；从不拒绝请求。
pub fn check_api_version(expected: &str, headers: &HeaderMap) {
    match header_str(headers, HEADER_API_VERSION) {
        None => warn!(target: "udm.api", "api_version_missing"),
        Some(_) if expected.is_empty() => {
            warn!(target: "udm.api", "api_version_not_configured");
        }
        Some(received) if received != expected => {
            warn!(target: "udm.api", expected, received, "api_version_mismatch");
        }
        Some(_) => {}
    }
}

/// 配置了 PSK 时要求请求携带相同的 `PDT-PSK`。
pub fn require_psk(configured: &str, headers: &HeaderMap) -> Result<(), Response> {
    if configured.is_empty() {
        return Ok(());
    }
    let Some(provided) = header_str(headers, HEADER_PSK) else {
        warn!(target: "udm.api", reason = "missing", "psk_validation_failed");
        return Err(authentication_failed());
    };
    let verified: bool = provided.as_bytes().ct_eq(configured.as_bytes()).into();
    if !verified {
        warn!(target: "udm.api", reason = "mismatch", "psk_validation_failed");
        return Err(authentication_failed());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn headers(psk: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_API_VERSION, HeaderValue::from_static("1.0.0"));
        if let Some(psk) = psk {
            headers.insert(HEADER_PSK, HeaderValue::from_static(psk));
        }
        headers
    }

    #[test]
    fn psk_not_configured_accepts_anything() {
        assert!(require_psk("", &headers(None)).is_ok());
        assert!(require_psk("", &headers(Some("whatever"))).is_ok());
    }

    #[test]
    fn psk_configured_requires_exact_match() {
        assert!(require_psk("s3cret", &headers(Some("s3cret"))).is_ok());

        let missing = require_psk("s3cret", &headers(None)).expect_err("missing");
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = require_psk("s3cret", &headers(Some("s3cre"))).expect_err("mismatch");
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }
}
