//! 稳定的 DTO 与 API 响应契约。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 请求头：客户端声明的 API 版本（不一致时仅告警）。
pub const HEADER_API_VERSION: &str = "PDT-API-VERSION";

/// 请求头：预共享密钥。
pub const HEADER_PSK: &str = "PDT-PSK";

/// 延迟模式下 PATCH 的受理提示。
pub const PATCH_ACCEPTED_MESSAGE: &str = "State change accepted";

/// PSK 校验失败时的错误信息。
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "Authentication failed";

/// 标准 API 响应封装（health / metrics / reports 受理使用）；失败路径统一返回 [`ErrorBody`]。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
        }
    }
}

/// roomstatus 接口的错误体：`{"error": "..."}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// 延迟模式下 PATCH 的 202 响应体。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchAcceptedResponse {
    pub message: String,
}

impl Default for PatchAcceptedResponse {
    fn default() -> Self {
        Self {
            message: PATCH_ACCEPTED_MESSAGE.to_string(),
        }
    }
}

/// 本地设备上报（`POST .../reports` 的数组元素）。
///
/// 按字段组合区分四种形态：
/// - `{"deviceIndex":3,"property":"status","value":"OK"}`
/// - `{"customIndex":2,"field":"value","value":"21C"}`
/// - `{"standard":"occupancy","value":true}`
/// - `{"deviceKey":"room-mic","property":"power","value":"on"}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReportedUpdateRequest {
    #[serde(rename_all = "camelCase")]
    Device {
        device_index: usize,
        property: String,
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    Custom {
        custom_index: usize,
        field: String,
        value: Value,
    },
    Standard { standard: String, value: Value },
    #[serde(rename_all = "camelCase")]
    Keyed {
        device_key: String,
        property: String,
        #[serde(default)]
        value: Option<String>,
    },
}

/// `POST .../reports` 的 202 响应数据。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportBurstAccepted {
    pub accepted: usize,
    /// 实际改变上报状态的字段数。
    pub changed: usize,
    /// 无法解析（越界索引、未知设备等）而被丢弃的条目数。
    pub dropped: usize,
}

/// 健康检查数据。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub api_version: String,
    pub feedback_mode: String,
}

/// 指标快照 DTO。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub patches_accepted: u64,
    pub patches_rejected: u64,
    pub reported_updates: u64,
    pub reported_changes: u64,
    pub dropped_invalid_index: u64,
    pub dropped_unknown_key: u64,
    pub reports_emitted: u64,
    pub desired_events: u64,
    pub actuations: u64,
    pub pending_discarded: u64,
}
