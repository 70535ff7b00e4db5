//! 规范字段路径与字段值。

use crate::{DEVICE_KEY_PREFIX, PROPERTY_KEY_PREFIX, parse_slot_key};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 路径解析错误：路径不在状态 schema 中。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathParseError {
    #[error("unknown state path: {0}")]
    Unknown(String),
}

/// 字段的值类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Flag,
    Count,
}

impl FieldKind {
    /// 与 JSON 类型名一致，用于错误信息。
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Flag => "boolean",
            FieldKind::Count => "number",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 房间级标准属性字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StandardField {
    Version,
    State,
    Error,
    Occupancy,
    HelpRequest,
    Activity,
}

impl StandardField {
    pub const ALL: [StandardField; 6] = [
        StandardField::Version,
        StandardField::State,
        StandardField::Error,
        StandardField::Occupancy,
        StandardField::HelpRequest,
        StandardField::Activity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StandardField::Version => "Version",
            StandardField::State => "State",
            StandardField::Error => "Error",
            StandardField::Occupancy => "Occupancy",
            StandardField::HelpRequest => "HelpRequest",
            StandardField::Activity => "Activity",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            StandardField::Occupancy => FieldKind::Flag,
            _ => FieldKind::Text,
        }
    }

    /// 按名称查找（不区分大小写，`helpRequest` 与 `HelpRequest` 等价）。
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// 单个设备槽位的属性。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceProperty {
    Label,
    Status,
    Description,
    VideoSource,
    AudioSource,
    Usage,
    Error,
}

impl DeviceProperty {
    pub const ALL: [DeviceProperty; 7] = [
        DeviceProperty::Label,
        DeviceProperty::Status,
        DeviceProperty::Description,
        DeviceProperty::VideoSource,
        DeviceProperty::AudioSource,
        DeviceProperty::Usage,
        DeviceProperty::Error,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DeviceProperty::Label => "Label",
            DeviceProperty::Status => "Status",
            DeviceProperty::Description => "Description",
            DeviceProperty::VideoSource => "VideoSource",
            DeviceProperty::AudioSource => "AudioSource",
            DeviceProperty::Usage => "Usage",
            DeviceProperty::Error => "Error",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            DeviceProperty::Usage => FieldKind::Count,
            _ => FieldKind::Text,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|property| property.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// 自定义属性槽位的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CustomField {
    Label,
    Value,
}

impl CustomField {
    pub fn name(self) -> &'static str {
        match self {
            CustomField::Label => "Label",
            CustomField::Value => "Value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [CustomField::Label, CustomField::Value]
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// 规范状态中的一个叶子字段。
///
/// 展示形式即差异集合中的全限定路径，例如 `Standard.Activity`、
/// `Status.Devices[3].Status`、`Custom.Properties[2].Value`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldPath {
    ApiVersion,
    Standard(StandardField),
    Device {
        index: usize,
        property: DeviceProperty,
    },
    Custom {
        index: usize,
        field: CustomField,
    },
}

impl FieldPath {
    pub fn device(index: usize, property: DeviceProperty) -> Self {
        FieldPath::Device { index, property }
    }

    pub fn custom(index: usize, field: CustomField) -> Self {
        FieldPath::Custom { index, field }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldPath::ApiVersion => FieldKind::Text,
            FieldPath::Standard(field) => field.kind(),
            FieldPath::Device { property, .. } => property.kind(),
            FieldPath::Custom { .. } => FieldKind::Text,
        }
    }

    /// 解析点分路径（不区分大小写）。
    ///
    /// 支持：`apiVersion`、`standard.activity`、`status.devices.device3.status`、
    /// `status.devices[3].status`、`custom.property2.value`、`custom[2].value`、
    /// `custom.properties[2].value`。
    pub fn parse(raw: &str) -> Result<Self, PathParseError> {
        let unknown = || PathParseError::Unknown(raw.to_string());
        let segments = split_segments(raw).ok_or_else(unknown)?;
        let lowered: Vec<String> = segments.iter().map(|s| s.to_ascii_lowercase()).collect();
        let parts: Vec<&str> = lowered.iter().map(String::as_str).collect();

        let path = match parts.as_slice() {
            ["apiversion"] => FieldPath::ApiVersion,
            ["standard", field] => FieldPath::Standard(StandardField::from_name(field).ok_or_else(unknown)?),
            ["status", "devices", slot, property] => FieldPath::Device {
                index: slot_index(DEVICE_KEY_PREFIX, slot).ok_or_else(unknown)?,
                property: DeviceProperty::from_name(property).ok_or_else(unknown)?,
            },
            ["custom", "properties", slot, field] | ["custom", slot, field] => FieldPath::Custom {
                index: slot_index(PROPERTY_KEY_PREFIX, slot).ok_or_else(unknown)?,
                field: CustomField::from_name(field).ok_or_else(unknown)?,
            },
            _ => return Err(unknown()),
        };
        Ok(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::ApiVersion => f.write_str("ApiVersion"),
            FieldPath::Standard(field) => write!(f, "Standard.{}", field.name()),
            FieldPath::Device { index, property } => {
                write!(f, "Status.Devices[{}].{}", index, property.name())
            }
            FieldPath::Custom { index, field } => {
                write!(f, "Custom.Properties[{}].{}", index, field.name())
            }
        }
    }
}

impl Serialize for FieldPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn slot_index(prefix: &str, raw: &str) -> Option<usize> {
    parse_slot_key(prefix, raw).filter(|index| *index >= 1)
}

/// `a.b[3].c` -> `["a", "b", "3", "c"]`
fn split_segments(raw: &str) -> Option<Vec<&str>> {
    let mut segments = Vec::new();
    for part in raw.trim().split('.') {
        match part.find('[') {
            Some(open) => {
                let inner = part[open + 1..].strip_suffix(']')?;
                let name = &part[..open];
                if !name.is_empty() {
                    segments.push(name);
                }
                segments.push(inner);
            }
            None => segments.push(part),
        }
    }
    if segments.iter().any(|segment| segment.is_empty()) {
        return None;
    }
    Some(segments)
}

/// 叶子字段的值。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Count(u16),
    Text(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Flag(_) => FieldKind::Flag,
            FieldValue::Count(_) => FieldKind::Count,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value),
            _ => None,
        }
    }

    /// 将设备侧的原始字符串转换为目标字段类型。
    pub fn parse_as(kind: FieldKind, raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match kind {
            FieldKind::Text => Some(FieldValue::Text(raw.to_string())),
            FieldKind::Flag => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => Some(FieldValue::Flag(true)),
                "0" | "false" | "off" | "no" => Some(FieldValue::Flag(false)),
                _ => None,
            },
            FieldKind::Count => trimmed.parse::<u16>().ok().map(FieldValue::Count),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(value) => write!(f, "{}", value),
            FieldValue::Count(value) => write!(f, "{}", value),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_dotted_and_bracketed_forms() {
        assert_eq!(
            FieldPath::parse("standard.activity").expect("activity"),
            FieldPath::Standard(StandardField::Activity)
        );
        assert_eq!(
            FieldPath::parse("Status.Devices[3].VideoSource").expect("device"),
            FieldPath::device(3, DeviceProperty::VideoSource)
        );
        assert_eq!(
            FieldPath::parse("status.devices.device3.status").expect("device"),
            FieldPath::device(3, DeviceProperty::Status)
        );
        assert_eq!(
            FieldPath::parse("custom.property2.value").expect("custom"),
            FieldPath::custom(2, CustomField::Value)
        );
        assert_eq!(
            FieldPath::parse("custom[2].label").expect("custom"),
            FieldPath::custom(2, CustomField::Label)
        );
        assert_eq!(FieldPath::parse("apiVersion").expect("api"), FieldPath::ApiVersion);
    }

    #[test]
    fn parse_rejects_paths_outside_schema() {
        for raw in [
            "standard.volume",
            "status.devices.device0.status",
            "status.devices[3]",
            "status.devices[3].power",
            "custom.property2.color",
            "standard..state",
            "",
        ] {
            assert!(FieldPath::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        let paths = [
            FieldPath::ApiVersion,
            FieldPath::Standard(StandardField::HelpRequest),
            FieldPath::device(17, DeviceProperty::AudioSource),
            FieldPath::custom(5, CustomField::Label),
        ];
        for path in paths {
            assert_eq!(FieldPath::parse(&path.to_string()).expect("parse"), path);
        }
    }

    #[test]
    fn parse_as_coerces_raw_strings() {
        assert_eq!(FieldValue::parse_as(FieldKind::Flag, "On"), Some(FieldValue::Flag(true)));
        assert_eq!(FieldValue::parse_as(FieldKind::Count, " 42 "), Some(FieldValue::Count(42)));
        assert_eq!(FieldValue::parse_as(FieldKind::Count, "70000"), None);
        assert_eq!(FieldValue::parse_as(FieldKind::Flag, "maybe"), None);
    }
}
