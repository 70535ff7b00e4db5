//! 本地上报接入
//!
//! - POST {base}/reports：设备侧上报数组，作为一次突发处理（延迟模式下只上报一次）

use api_contract::{ApiResponse, ReportBurstAccepted, ReportedUpdateRequest};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{CustomField, DeviceProperty, FieldValue, StandardField};
use serde_json::Value;
use tracing::{info, warn};
use udm_mapping::ReportedUpdate;
use udm_router::RouterError;

use crate::AppState;
use crate::middleware::validate_request_headers;
use crate::utils::response::{bad_request, internal_error};

pub async fn post_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(response) = validate_request_headers(&state.configuration, &headers) {
        return response;
    }

    let requests: Vec<ReportedUpdateRequest> = match serde_json::from_slice(&body) {
        Ok(requests) => requests,
        Err(err) => {
            warn!(target: "udm.api", error = %err, "report_body_invalid");
            return bad_request(format!("invalid report body: {}", err));
        }
    };

    let mut updates = Vec::with_capacity(requests.len());
    for (position, request) in requests.into_iter().enumerate() {
        match to_reported_update(request) {
            Ok(update) => updates.push(update),
            Err(message) => {
                warn!(target: "udm.api", position, error = %message, "report_request_invalid");
                return bad_request(format!("reports[{}]: {}", position, message));
            }
        }
    }

    let accepted = updates.len();
    match state.router.report_burst(updates).await {
        Ok(outcome) => {
            info!(
                target: "udm.api",
                accepted,
                changed = outcome.changed.len(),
                dropped = outcome.dropped.len(),
                reports_emitted = outcome.reports_emitted,
                "report_burst_processed"
            );
            (
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(ReportBurstAccepted {
                    accepted,
                    changed: outcome.changed.len(),
                    dropped: outcome.dropped.len(),
                })),
            )
                .into_response()
        }
        Err(RouterError::Closed) | Err(RouterError::Rejected(_)) => {
            warn!(target: "udm.api", "router_unavailable");
            internal_error()
        }
    }
}

/// 请求 DTO 转为路由输入；字段名不区分大小写。
pub fn to_reported_update(request: ReportedUpdateRequest) -> Result<ReportedUpdate, String> {
    let update = match request {
        ReportedUpdateRequest::Device {
            device_index,
            property,
            value,
        } => ReportedUpdate::Device {
            index: device_index,
            property: DeviceProperty::from_name(&property)
                .ok_or_else(|| format!("unknown device property: {}", property))?,
            value: field_value(value)?,
        },
        ReportedUpdateRequest::Custom {
            custom_index,
            field,
            value,
        } => ReportedUpdate::Custom {
            index: custom_index,
            field: CustomField::from_name(&field)
                .ok_or_else(|| format!("unknown custom field: {}", field))?,
            value: field_value(value)?,
        },
        ReportedUpdateRequest::Standard { standard, value } => ReportedUpdate::Standard {
            field: StandardField::from_name(&standard)
                .ok_or_else(|| format!("unknown standard property: {}", standard))?,
            value: field_value(value)?,
        },
        ReportedUpdateRequest::Keyed {
            device_key,
            property,
            value,
        } => ReportedUpdate::Keyed {
            device_key,
            property,
            value,
        },
    };
    Ok(update)
}

fn field_value(value: Value) -> Result<FieldValue, String> {
    match value {
        Value::String(text) => Ok(FieldValue::Text(text)),
        Value::Bool(flag) => Ok(FieldValue::Flag(flag)),
        Value::Number(number) => number
            .as_u64()
            .and_then(|count| u16::try_from(count).ok())
            .map(FieldValue::Count)
            .ok_or_else(|| format!("number out of range: {}", number)),
        other => Err(format!("unsupported value: {}", other)),
    }
}
