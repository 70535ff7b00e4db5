//! 房间状态规范模型：期望状态与上报状态共用的数据结构。

pub mod path;
pub mod slots;
pub mod state;

pub use path::{
    CustomField, DeviceProperty, FieldKind, FieldPath, FieldValue, PathParseError, StandardField,
};
pub use slots::{SlotTable, parse_slot_key};
pub use state::{
    CustomProperty, DeviceStatus, StandardProperties, State, StatusProperties, WriteError,
};

/// 默认设备槽位数量（device1..device20）。
pub const DEFAULT_DEVICE_SLOTS: usize = 20;

/// 默认自定义属性槽位数量（property1..property20）。
pub const DEFAULT_CUSTOM_SLOTS: usize = 20;

/// 设备槽位在线上格式中的 key 前缀。
pub const DEVICE_KEY_PREFIX: &str = "device";

/// 自定义属性槽位在线上格式中的 key 前缀。
pub const PROPERTY_KEY_PREFIX: &str = "property";

/// 默认 API 版本。
pub const DEFAULT_API_VERSION: &str = "1.0.0";
