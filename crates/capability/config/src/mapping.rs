//! 映射配置文件的数据结构（JSON，camelCase）。
//!
//! 启动时加载一次，进程生命周期内只读；重新配置时整体替换。

use domain::{
    DEFAULT_API_VERSION, DEFAULT_CUSTOM_SLOTS, DEFAULT_DEVICE_SLOTS, FieldPath, PathParseError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 格式化字符串中的值占位符。
pub const FORMAT_PLACEHOLDER: &str = "{0}";

/// PATCH 的反馈模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    /// 变更累积，静默期结束或显式 flush 后合并上报。
    #[default]
    Deferred,
    /// 每个变更立即上报。
    Immediate,
}

impl FeedbackMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackMode::Deferred => "deferred",
            FeedbackMode::Immediate => "immediate",
        }
    }
}

impl fmt::Display for FeedbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(FeedbackMode::Deferred),
            "immediate" => Ok(FeedbackMode::Immediate),
            other => Err(format!("unknown feedback mode: {other}")),
        }
    }
}

/// 设备 key 与设备槽位的对应关系。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceMapping {
    pub device_key: String,
    pub device_index: usize,
    pub custom_label: Option<String>,
    pub description: Option<String>,
}

impl DeviceMapping {
    /// 槽位标签：优先自定义标签，否则使用设备 key。
    pub fn label(&self) -> &str {
        self.custom_label
            .as_deref()
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.device_key)
    }
}

/// 设备属性到规范字段的映射。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PropertyMapping {
    pub device_key: String,
    /// 规范状态路径；专用映射（activity / helpRequest / custom）可省略。
    pub property_path: Option<String>,
    /// 设备侧属性名；省略时匹配该设备的任意属性。
    pub source_property: Option<String>,
    pub value_map: BTreeMap<String, String>,
    pub format: Option<String>,
    pub default_value: Option<String>,
}

impl PropertyMapping {
    /// 是否消费设备 `device_key` 的 `property` 上报（均不区分大小写）。
    pub fn matches(&self, device_key: &str, property: &str) -> bool {
        if !self.device_key.eq_ignore_ascii_case(device_key) {
            return false;
        }
        match self.source_property.as_deref() {
            Some(source) => source.eq_ignore_ascii_case(property),
            None => true,
        }
    }

    /// 映射的目标字段：显式 `propertyPath` 优先，否则使用专用映射的默认目标。
    pub fn target(&self, fallback: Option<FieldPath>) -> Result<FieldPath, PathParseError> {
        match non_empty(self.property_path.as_deref()) {
            Some(raw) => FieldPath::parse(raw),
            None => fallback.ok_or_else(|| PathParseError::Unknown(String::new())),
        }
    }

    /// 值映射 -> 格式化；原始值缺失时回退到默认值（默认值不再映射）。
    pub fn render(&self, raw: Option<&str>) -> Option<String> {
        let Some(raw) = raw else {
            return self.default_value.clone();
        };
        let mapped = self
            .value_map
            .get(raw)
            .map(String::as_str)
            .unwrap_or(raw);
        match self.format.as_deref() {
            Some(format) if !format.is_empty() => Some(format.replace(FORMAT_PLACEHOLDER, mapped)),
            _ => Some(mapped.to_string()),
        }
    }
}

/// 活动映射：读取侧为属性映射，写入侧为活动值到函数名的表。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityMapping {
    pub get_property: Option<PropertyMapping>,
    pub set_functions: BTreeMap<String, String>,
    pub set_device_key: Option<String>,
}

impl ActivityMapping {
    /// 活动值对应的函数名（不区分大小写）。
    pub fn function_for(&self, activity: &str) -> Option<&str> {
        self.set_functions
            .iter()
            .find(|(value, _)| value.eq_ignore_ascii_case(activity))
            .map(|(_, function)| function.as_str())
    }
}

/// 自定义属性映射（property1..propertyM）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomPropertyMapping {
    pub property_key: String,
    pub label: Option<String>,
    pub mapping: Option<PropertyMapping>,
}

/// 房间状态动作表。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoomStateActions {
    pub shutdown: Vec<String>,
    pub active: Vec<String>,
    pub standby: Vec<String>,
}

impl RoomStateActions {
    /// 房间状态值对应的设备列表；未知状态返回空。
    pub fn devices_for(&self, state: &str) -> &[String] {
        match state.trim().to_ascii_lowercase().as_str() {
            "shutdown" => self.shutdown.as_slice(),
            "active" => self.active.as_slice(),
            "standby" => self.standby.as_slice(),
            _ => &[],
        }
    }

    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.shutdown
            .iter()
            .chain(&self.active)
            .chain(&self.standby)
            .map(String::as_str)
    }
}

/// 房间级标准属性配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StandardPropertiesConfig {
    pub version: String,
    pub room_device_key: Option<String>,
    pub occupancy_device_key: Option<String>,
    pub help_request_device_key: Option<String>,
    pub activity_device_key: Option<String>,
    pub activity_mapping: Option<ActivityMapping>,
    pub help_request_mapping: Option<PropertyMapping>,
    pub custom_property_mappings: Vec<CustomPropertyMapping>,
}

impl Default for StandardPropertiesConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_API_VERSION.to_string(),
            room_device_key: None,
            occupancy_device_key: None,
            help_request_device_key: None,
            activity_device_key: None,
            activity_mapping: None,
            help_request_mapping: None,
            custom_property_mappings: Vec::new(),
        }
    }
}

impl StandardPropertiesConfig {
    /// 活动写入侧的目标设备：setDeviceKey -> getProperty.deviceKey -> activityDeviceKey。
    pub fn activity_set_device_key(&self) -> Option<&str> {
        let mapping = self.activity_mapping.as_ref();
        mapping
            .and_then(|mapping| non_empty(mapping.set_device_key.as_deref()))
            .or_else(|| {
                mapping
                    .and_then(|mapping| mapping.get_property.as_ref())
                    .and_then(|property| non_empty(Some(property.device_key.as_str())))
            })
            .or_else(|| non_empty(self.activity_device_key.as_deref()))
    }

    /// 标准角色设备 key（房间、占用、求助、活动）。
    pub fn role_keys(&self) -> impl Iterator<Item = &str> {
        [
            self.room_device_key.as_deref(),
            self.occupancy_device_key.as_deref(),
            self.help_request_device_key.as_deref(),
            self.activity_device_key.as_deref(),
        ]
        .into_iter()
        .filter_map(non_empty)
    }
}

/// 上报反馈参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedbackSettings {
    pub quiescence_ms: u64,
    pub flush_threshold: usize,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            quiescence_ms: 250,
            flush_threshold: 64,
        }
    }
}

/// 完整的映射配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UdmCwsConfiguration {
    pub api_version: String,
    /// 为空表示不校验 PSK。
    pub psk: String,
    pub feedback_mode: FeedbackMode,
    /// 多房间路由前缀，例如 `room1` -> `/app01/udmcws/room1/roomstatus`。
    pub route_prefix: String,
    pub device_slots: usize,
    pub custom_slots: usize,
    pub device_mappings: Vec<DeviceMapping>,
    /// 通用属性映射，`propertyPath` 必填。
    pub property_mappings: Vec<PropertyMapping>,
    pub room_state_actions: RoomStateActions,
    pub standard_properties: StandardPropertiesConfig,
    pub feedback: FeedbackSettings,
}

impl Default for UdmCwsConfiguration {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            psk: String::new(),
            feedback_mode: FeedbackMode::Deferred,
            route_prefix: String::new(),
            device_slots: DEFAULT_DEVICE_SLOTS,
            custom_slots: DEFAULT_CUSTOM_SLOTS,
            device_mappings: Vec::new(),
            property_mappings: Vec::new(),
            room_state_actions: RoomStateActions::default(),
            standard_properties: StandardPropertiesConfig::default(),
            feedback: FeedbackSettings::default(),
        }
    }
}

impl UdmCwsConfiguration {
    pub fn psk_required(&self) -> bool {
        !self.psk.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> PropertyMapping {
        PropertyMapping {
            device_key: "codec".to_string(),
            source_property: Some("SharingSource".to_string()),
            value_map: BTreeMap::from([("laptop".to_string(), "presentation".to_string())]),
            format: Some("src:{0}".to_string()),
            default_value: Some("none".to_string()),
            ..PropertyMapping::default()
        }
    }

    #[test]
    fn render_maps_then_formats() {
        let mapping = mapping();
        assert_eq!(mapping.render(Some("laptop")).as_deref(), Some("src:presentation"));
        assert_eq!(mapping.render(Some("camera")).as_deref(), Some("src:camera"));
        assert_eq!(mapping.render(None).as_deref(), Some("none"));
    }

    #[test]
    fn matches_is_case_insensitive() {
        let mapping = mapping();
        assert!(mapping.matches("CODEC", "sharingsource"));
        assert!(!mapping.matches("codec", "volume"));
        assert!(!mapping.matches("display", "SharingSource"));
    }

    #[test]
    fn activity_set_device_key_falls_back() {
        let mut standard = StandardPropertiesConfig {
            activity_device_key: Some("room".to_string()),
            ..StandardPropertiesConfig::default()
        };
        assert_eq!(standard.activity_set_device_key(), Some("room"));

        standard.activity_mapping = Some(ActivityMapping {
            get_property: Some(mapping()),
            ..ActivityMapping::default()
        });
        assert_eq!(standard.activity_set_device_key(), Some("codec"));

        if let Some(activity) = standard.activity_mapping.as_mut() {
            activity.set_device_key = Some("switcher".to_string());
        }
        assert_eq!(standard.activity_set_device_key(), Some("switcher"));
    }

    #[test]
    fn feedback_mode_parses_case_insensitively() {
        assert_eq!("Immediate".parse::<FeedbackMode>(), Ok(FeedbackMode::Immediate));
        assert_eq!("deferred".parse::<FeedbackMode>(), Ok(FeedbackMode::Deferred));
        assert!("later".parse::<FeedbackMode>().is_err());
    }
}
