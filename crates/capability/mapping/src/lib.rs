//! 设备索引/属性 key 与规范状态路径之间的映射解析。

mod resolver;

pub use resolver::MappingResolver;

use domain::{CustomField, DeviceProperty, FieldKind, FieldPath, FieldValue, StandardField};
use serde::Serialize;

/// 单条上报的解析错误；只丢弃该条写入，不影响后续处理。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("index {index} outside 1..={slots}")]
    InvalidIndex { index: usize, slots: usize },
    #[error("no device mapped at index {0}")]
    UnmappedIndex(usize),
    #[error("unknown device key: {0}")]
    UnknownDeviceKey(String),
    #[error("unmapped property {property} for device {device_key}")]
    UnmappedProperty {
        device_key: String,
        property: String,
    },
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    KindMismatch {
        path: FieldPath,
        expected: FieldKind,
        found: FieldKind,
    },
}

/// 本地设备上报。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportedUpdate {
    /// 按槽位索引上报设备属性。
    Device {
        index: usize,
        property: DeviceProperty,
        value: FieldValue,
    },
    /// 按槽位索引上报自定义属性。
    Custom {
        index: usize,
        field: CustomField,
        value: FieldValue,
    },
    /// 房间级标准属性。
    Standard {
        field: StandardField,
        value: FieldValue,
    },
    /// 按设备 key 与设备侧属性名上报，经配置的属性映射解析。
    Keyed {
        device_key: String,
        property: String,
        value: Option<String>,
    },
}

impl ReportedUpdate {
    pub fn device(index: usize, property: DeviceProperty, value: impl Into<String>) -> Self {
        ReportedUpdate::Device {
            index,
            property,
            value: FieldValue::Text(value.into()),
        }
    }

    pub fn keyed(
        device_key: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        ReportedUpdate::Keyed {
            device_key: device_key.into(),
            property: property.into(),
            value: Some(value.into()),
        }
    }
}

/// 解析后的单字段写入。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWrite {
    pub path: FieldPath,
    pub value: FieldValue,
}

/// 执行信号类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActuationKind {
    RoomStateChange,
    RoomActivityChange,
}

/// 期望状态变化驱动的本地执行信号。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuationSignal {
    pub kind: ActuationKind,
    pub value: String,
    pub target_device_key: Option<String>,
    pub function: Option<String>,
    pub affected_devices: Vec<String>,
}
