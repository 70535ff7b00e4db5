//! 映射配置的加载期校验。

use crate::ConfigError;
use crate::mapping::{FORMAT_PLACEHOLDER, PropertyMapping, UdmCwsConfiguration};
use domain::{CustomField, FieldKind, FieldPath, PROPERTY_KEY_PREFIX, StandardField, parse_slot_key};
use std::collections::BTreeSet;

impl UdmCwsConfiguration {
    /// 校验映射配置；任何一条映射无法解析都会拒绝整个配置。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_slots == 0 {
            return Err(invalid("deviceSlots", "0"));
        }
        if self.custom_slots == 0 {
            return Err(invalid("customSlots", "0"));
        }
        if self.feedback.flush_threshold == 0 {
            return Err(invalid("feedback.flushThreshold", "0"));
        }

        let mut keys = BTreeSet::new();
        let mut indices = BTreeSet::new();
        for mapping in &self.device_mappings {
            let key = mapping.device_key.trim();
            if key.is_empty() {
                return Err(invalid("deviceMappings.deviceKey", ""));
            }
            if !keys.insert(key.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateDeviceKey(key.to_string()));
            }
            if mapping.device_index < 1 || mapping.device_index > self.device_slots {
                return Err(ConfigError::DeviceIndexOutOfRange {
                    key: key.to_string(),
                    index: mapping.device_index,
                    slots: self.device_slots,
                });
            }
            if !indices.insert(mapping.device_index) {
                return Err(ConfigError::DuplicateDeviceIndex(mapping.device_index));
            }
        }

        let known = self.known_device_keys();
        let standard = &self.standard_properties;
        if let Some(activity) = &standard.activity_mapping {
            if let Some(get) = &activity.get_property {
                self.check_mapping(
                    "activityMapping.getProperty",
                    get,
                    Some(FieldPath::Standard(StandardField::Activity)),
                    &known,
                )?;
            }
            if let Some(key) = activity.set_device_key.as_deref() {
                if !key.trim().is_empty() {
                    check_known("activityMapping.setDeviceKey", key, &known)?;
                }
            }
        }
        if let Some(help) = &standard.help_request_mapping {
            self.check_mapping(
                "helpRequestMapping",
                help,
                Some(FieldPath::Standard(StandardField::HelpRequest)),
                &known,
            )?;
        }

        let mut custom_indices = BTreeSet::new();
        for custom in &standard.custom_property_mappings {
            let index = parse_slot_key(PROPERTY_KEY_PREFIX, &custom.property_key)
                .filter(|index| *index >= 1 && *index <= self.custom_slots)
                .ok_or_else(|| ConfigError::InvalidPropertyKey(custom.property_key.clone()))?;
            if !custom_indices.insert(index) {
                return Err(ConfigError::InvalidPropertyKey(format!(
                    "{} (duplicate)",
                    custom.property_key
                )));
            }
            if let Some(mapping) = &custom.mapping {
                self.check_mapping(
                    &format!("customPropertyMappings.{}", custom.property_key),
                    mapping,
                    Some(FieldPath::custom(index, CustomField::Value)),
                    &known,
                )?;
            }
        }

        for (position, mapping) in self.property_mappings.iter().enumerate() {
            self.check_mapping(&format!("propertyMappings[{position}]"), mapping, None, &known)?;
        }

        for key in self.room_state_actions.all_keys() {
            check_known("roomStateActions", key, &known)?;
        }
        Ok(())
    }

    /// 已知设备 key 集合（小写）：设备映射 key ∪ 标准角色 key。
    pub fn known_device_keys(&self) -> BTreeSet<String> {
        self.device_mappings
            .iter()
            .map(|mapping| mapping.device_key.trim())
            .chain(self.standard_properties.role_keys())
            .map(|key| key.trim().to_ascii_lowercase())
            .filter(|key| !key.is_empty())
            .collect()
    }

    fn check_mapping(
        &self,
        context: &str,
        mapping: &PropertyMapping,
        fallback: Option<FieldPath>,
        known: &BTreeSet<String>,
    ) -> Result<FieldPath, ConfigError> {
        check_known(context, &mapping.device_key, known)?;
        let unknown_path = || ConfigError::UnknownPropertyPath {
            context: context.to_string(),
            path: mapping.property_path.clone().unwrap_or_default(),
        };
        let target = mapping.target(fallback).map_err(|_| unknown_path())?;
        if target.kind() != FieldKind::Text {
            return Err(unknown_path());
        }
        let in_range = match target {
            FieldPath::Device { index, .. } => index <= self.device_slots,
            FieldPath::Custom { index, .. } => index <= self.custom_slots,
            _ => true,
        };
        if !in_range {
            return Err(unknown_path());
        }
        if let Some(format) = mapping.format.as_deref() {
            if !format.is_empty() && !format.contains(FORMAT_PLACEHOLDER) {
                return Err(invalid(&format!("{context}.format"), format));
            }
        }
        Ok(target)
    }
}

fn check_known(context: &str, key: &str, known: &BTreeSet<String>) -> Result<(), ConfigError> {
    if known.contains(&key.trim().to_ascii_lowercase()) {
        return Ok(());
    }
    Err(ConfigError::UnknownDeviceKey {
        context: context.to_string(),
        key: key.to_string(),
    })
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::Invalid(key.to_string(), value.to_string())
}
