//! 规范状态聚合。

use crate::path::{CustomField, DeviceProperty, FieldKind, FieldPath, FieldValue, StandardField};
use crate::{
    DEFAULT_CUSTOM_SLOTS, DEFAULT_DEVICE_SLOTS, DEVICE_KEY_PREFIX, PROPERTY_KEY_PREFIX, SlotTable,
};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// 单字段写入错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("slot out of range at {path}")]
    OutOfRange { path: FieldPath },
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    KindMismatch {
        path: FieldPath,
        expected: FieldKind,
        found: FieldKind,
    },
}

/// 房间级摘要（云端服务消费的标准属性）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardProperties {
    pub version: String,
    pub state: String,
    pub error: String,
    pub occupancy: bool,
    pub help_request: String,
    pub activity: String,
}

/// 单个设备槽位状态。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub label: String,
    pub status: String,
    pub description: String,
    pub video_source: String,
    pub audio_source: String,
    pub usage: u16,
    pub error: String,
}

/// 自定义属性（label/value 对）。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CustomProperty {
    pub label: String,
    pub value: String,
}

/// 设备状态集合。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StatusProperties {
    pub devices: SlotTable<DeviceStatus>,
}

/// 状态根聚合。期望侧与上报侧共用同一 schema。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub api_version: String,
    pub standard: StandardProperties,
    pub status: StatusProperties,
    pub custom: SlotTable<CustomProperty>,
}

enum FieldSlot<'a> {
    Text(&'a mut String),
    Flag(&'a mut bool),
    Count(&'a mut u16),
}

impl FieldSlot<'_> {
    fn kind(&self) -> FieldKind {
        match self {
            FieldSlot::Text(_) => FieldKind::Text,
            FieldSlot::Flag(_) => FieldKind::Flag,
            FieldSlot::Count(_) => FieldKind::Count,
        }
    }
}

impl State {
    pub fn new(api_version: impl Into<String>, device_slots: usize, custom_slots: usize) -> Self {
        Self {
            api_version: api_version.into(),
            standard: StandardProperties::default(),
            status: StatusProperties {
                devices: SlotTable::new(DEVICE_KEY_PREFIX, device_slots),
            },
            custom: SlotTable::new(PROPERTY_KEY_PREFIX, custom_slots),
        }
    }

    /// 20 个设备槽位 + 20 个自定义属性槽位。
    pub fn with_default_slots(api_version: impl Into<String>) -> Self {
        Self::new(api_version, DEFAULT_DEVICE_SLOTS, DEFAULT_CUSTOM_SLOTS)
    }

    pub fn device(&self, index: usize) -> Option<&DeviceStatus> {
        self.status.devices.get(index)
    }

    pub fn custom_property(&self, index: usize) -> Option<&CustomProperty> {
        self.custom.get(index)
    }

    /// 结构化哈希，用于幂等重发判断。
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }

    /// 读取单个字段；槽位越界时返回 `None`。
    pub fn get(&self, path: &FieldPath) -> Option<FieldValue> {
        let value = match path {
            FieldPath::ApiVersion => FieldValue::Text(self.api_version.clone()),
            FieldPath::Standard(field) => {
                let standard = &self.standard;
                match field {
                    StandardField::Version => FieldValue::Text(standard.version.clone()),
                    StandardField::State => FieldValue::Text(standard.state.clone()),
                    StandardField::Error => FieldValue::Text(standard.error.clone()),
                    StandardField::Occupancy => FieldValue::Flag(standard.occupancy),
                    StandardField::HelpRequest => FieldValue::Text(standard.help_request.clone()),
                    StandardField::Activity => FieldValue::Text(standard.activity.clone()),
                }
            }
            FieldPath::Device { index, property } => {
                let device = self.status.devices.get(*index)?;
                match property {
                    DeviceProperty::Label => FieldValue::Text(device.label.clone()),
                    DeviceProperty::Status => FieldValue::Text(device.status.clone()),
                    DeviceProperty::Description => FieldValue::Text(device.description.clone()),
                    DeviceProperty::VideoSource => FieldValue::Text(device.video_source.clone()),
                    DeviceProperty::AudioSource => FieldValue::Text(device.audio_source.clone()),
                    DeviceProperty::Usage => FieldValue::Count(device.usage),
                    DeviceProperty::Error => FieldValue::Text(device.error.clone()),
                }
            }
            FieldPath::Custom { index, field } => {
                let property = self.custom.get(*index)?;
                match field {
                    CustomField::Label => FieldValue::Text(property.label.clone()),
                    CustomField::Value => FieldValue::Text(property.value.clone()),
                }
            }
        };
        Some(value)
    }

    /// 写入单个字段，返回值是否真正变化（按值比较）。
    pub fn set(&mut self, path: &FieldPath, value: FieldValue) -> Result<bool, WriteError> {
        let slot = self.field_slot(path)?;
        let changed = match (slot, value) {
            (FieldSlot::Text(current), FieldValue::Text(next)) => replace_if_changed(current, next),
            (FieldSlot::Flag(current), FieldValue::Flag(next)) => replace_if_changed(current, next),
            (FieldSlot::Count(current), FieldValue::Count(next)) => {
                replace_if_changed(current, next)
            }
            (slot, value) => {
                return Err(WriteError::KindMismatch {
                    path: *path,
                    expected: slot.kind(),
                    found: value.kind(),
                });
            }
        };
        Ok(changed)
    }

    fn field_slot(&mut self, path: &FieldPath) -> Result<FieldSlot<'_>, WriteError> {
        let slot = match path {
            FieldPath::ApiVersion => FieldSlot::Text(&mut self.api_version),
            FieldPath::Standard(field) => {
                let standard = &mut self.standard;
                match field {
                    StandardField::Version => FieldSlot::Text(&mut standard.version),
                    StandardField::State => FieldSlot::Text(&mut standard.state),
                    StandardField::Error => FieldSlot::Text(&mut standard.error),
                    StandardField::Occupancy => FieldSlot::Flag(&mut standard.occupancy),
                    StandardField::HelpRequest => FieldSlot::Text(&mut standard.help_request),
                    StandardField::Activity => FieldSlot::Text(&mut standard.activity),
                }
            }
            FieldPath::Device { index, property } => {
                let device = self
                    .status
                    .devices
                    .get_mut(*index)
                    .ok_or(WriteError::OutOfRange { path: *path })?;
                match property {
                    DeviceProperty::Label => FieldSlot::Text(&mut device.label),
                    DeviceProperty::Status => FieldSlot::Text(&mut device.status),
                    DeviceProperty::Description => FieldSlot::Text(&mut device.description),
                    DeviceProperty::VideoSource => FieldSlot::Text(&mut device.video_source),
                    DeviceProperty::AudioSource => FieldSlot::Text(&mut device.audio_source),
                    DeviceProperty::Usage => FieldSlot::Count(&mut device.usage),
                    DeviceProperty::Error => FieldSlot::Text(&mut device.error),
                }
            }
            FieldPath::Custom { index, field } => {
                let property = self
                    .custom
                    .get_mut(*index)
                    .ok_or(WriteError::OutOfRange { path: *path })?;
                match field {
                    CustomField::Label => FieldSlot::Text(&mut property.label),
                    CustomField::Value => FieldSlot::Text(&mut property.value),
                }
            }
        };
        Ok(slot)
    }
}

fn replace_if_changed<T: PartialEq>(current: &mut T, next: T) -> bool {
    if *current == next {
        return false;
    }
    *current = next;
    true
}
