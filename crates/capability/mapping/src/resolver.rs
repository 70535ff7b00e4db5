use crate::{ActuationKind, ActuationSignal, ReportedUpdate, ResolveError, ResolvedWrite};
use domain::{CustomField, DeviceProperty, FieldKind, FieldPath, FieldValue, StandardField, State};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use udm_config::{ConfigError, PropertyMapping, UdmCwsConfiguration};

/// 已解析目标字段的属性映射。
#[derive(Debug, Clone)]
struct PropertyRoute {
    mapping: PropertyMapping,
    target: FieldPath,
}

/// 映射解析器：构造时校验配置并建立查找表，之后只做纯查找。
#[derive(Debug, Clone)]
pub struct MappingResolver {
    config: Arc<UdmCwsConfiguration>,
    key_by_index: BTreeMap<usize, String>,
    index_by_key: HashMap<String, usize>,
    known_keys: BTreeSet<String>,
    routes: Vec<PropertyRoute>,
}

impl MappingResolver {
    pub fn new(config: Arc<UdmCwsConfiguration>) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut key_by_index = BTreeMap::new();
        let mut index_by_key = HashMap::new();
        for mapping in &config.device_mappings {
            let key = mapping.device_key.trim();
            key_by_index.insert(mapping.device_index, key.to_string());
            index_by_key.insert(key.to_ascii_lowercase(), mapping.device_index);
        }

        let standard = &config.standard_properties;
        let mut routes = Vec::new();
        if let Some(get) = standard
            .activity_mapping
            .as_ref()
            .and_then(|activity| activity.get_property.as_ref())
        {
            routes.push(route(
                "activityMapping.getProperty",
                get,
                Some(FieldPath::Standard(StandardField::Activity)),
            )?);
        }
        if let Some(help) = &standard.help_request_mapping {
            routes.push(route(
                "helpRequestMapping",
                help,
                Some(FieldPath::Standard(StandardField::HelpRequest)),
            )?);
        }
        for custom in &standard.custom_property_mappings {
            let Some(mapping) = &custom.mapping else {
                continue;
            };
            let index = domain::parse_slot_key(domain::PROPERTY_KEY_PREFIX, &custom.property_key)
                .ok_or_else(|| ConfigError::InvalidPropertyKey(custom.property_key.clone()))?;
            routes.push(route(
                "customPropertyMappings",
                mapping,
                Some(FieldPath::custom(index, CustomField::Value)),
            )?);
        }
        for mapping in &config.property_mappings {
            routes.push(route("propertyMappings", mapping, None)?);
        }

        let known_keys = config.known_device_keys();
        Ok(Self {
            config,
            key_by_index,
            index_by_key,
            known_keys,
            routes,
        })
    }

    pub fn config(&self) -> &UdmCwsConfiguration {
        &self.config
    }

    /// 设备槽位索引 -> 设备 key。
    pub fn key_for_index(&self, index: usize) -> Result<&str, ResolveError> {
        self.check_device_index(index)?;
        self.key_by_index
            .get(&index)
            .map(String::as_str)
            .ok_or(ResolveError::UnmappedIndex(index))
    }

    /// 设备 key（不区分大小写）-> 设备槽位索引。
    pub fn index_for_key(&self, key: &str) -> Result<usize, ResolveError> {
        self.index_by_key
            .get(&key.trim().to_ascii_lowercase())
            .copied()
            .ok_or_else(|| ResolveError::UnknownDeviceKey(key.to_string()))
    }

    /// 将一条本地上报解析为规范字段写入。
    pub fn resolve(&self, update: &ReportedUpdate) -> Result<Vec<ResolvedWrite>, ResolveError> {
        match update {
            ReportedUpdate::Device {
                index,
                property,
                value,
            } => {
                self.check_device_index(*index)?;
                let path = FieldPath::device(*index, *property);
                Ok(vec![coerce(path, value)?])
            }
            ReportedUpdate::Custom {
                index,
                field,
                value,
            } => {
                if *index < 1 || *index > self.config.custom_slots {
                    return Err(ResolveError::InvalidIndex {
                        index: *index,
                        slots: self.config.custom_slots,
                    });
                }
                Ok(vec![coerce(FieldPath::custom(*index, *field), value)?])
            }
            ReportedUpdate::Standard { field, value } => {
                Ok(vec![coerce(FieldPath::Standard(*field), value)?])
            }
            ReportedUpdate::Keyed {
                device_key,
                property,
                value,
            } => self.resolve_keyed(device_key, property, value.as_deref()),
        }
    }

    fn resolve_keyed(
        &self,
        device_key: &str,
        property: &str,
        value: Option<&str>,
    ) -> Result<Vec<ResolvedWrite>, ResolveError> {
        let key = device_key.trim().to_ascii_lowercase();
        if !self.known_keys.contains(&key) {
            return Err(ResolveError::UnknownDeviceKey(device_key.to_string()));
        }

        let writes: Vec<ResolvedWrite> = self
            .routes
            .iter()
            .filter(|route| route.mapping.matches(device_key, property))
            .filter_map(|route| {
                route.mapping.render(value).map(|rendered| ResolvedWrite {
                    path: route.target,
                    value: FieldValue::Text(rendered),
                })
            })
            .collect();
        if !writes.is_empty() {
            return Ok(writes);
        }

        let Some(raw) = value else {
            return Err(unmapped(device_key, property));
        };
        if let (Some(index), Some(device_property)) = (
            self.index_by_key.get(&key),
            DeviceProperty::from_name(property),
        ) {
            let path = FieldPath::device(*index, device_property);
            return Ok(vec![coerce(path, &FieldValue::text(raw))?]);
        }
        match self.role_field(&key, property) {
            Some(field) => Ok(vec![role_write(field, raw)?]),
            None => Err(unmapped(device_key, property)),
        }
    }

    /// 标准角色设备只以各自角色的属性驱动标准字段。
    fn role_field(&self, key: &str, property: &str) -> Option<StandardField> {
        let standard = &self.config.standard_properties;
        let is = |candidate: &Option<String>| {
            candidate
                .as_deref()
                .is_some_and(|candidate| candidate.trim().eq_ignore_ascii_case(key))
        };
        let property = property.trim().to_ascii_lowercase();
        let property = property.as_str();
        if is(&standard.room_device_key) {
            if ROOM_ON_PROPERTIES.contains(&property) {
                return Some(StandardField::State);
            }
            if HELP_PROPERTIES.contains(&property) {
                return Some(StandardField::HelpRequest);
            }
        }
        if is(&standard.occupancy_device_key) && OCCUPANCY_PROPERTIES.contains(&property) {
            return Some(StandardField::Occupancy);
        }
        if is(&standard.help_request_device_key) && HELP_PROPERTIES.contains(&property) {
            return Some(StandardField::HelpRequest);
        }
        if is(&standard.activity_device_key) && property == "activity" {
            return Some(StandardField::Activity);
        }
        None
    }

    /// 期望状态字段变化对应的执行信号；非执行字段返回 `None`。
    pub fn actuation_for(&self, path: &FieldPath, value: &FieldValue) -> Option<ActuationSignal> {
        let value = value.as_text()?;
        let standard = &self.config.standard_properties;
        match path {
            FieldPath::Standard(StandardField::State) => Some(ActuationSignal {
                kind: ActuationKind::RoomStateChange,
                value: value.to_string(),
                target_device_key: standard.room_device_key.clone(),
                function: None,
                affected_devices: self.config.room_state_actions.devices_for(value).to_vec(),
            }),
            FieldPath::Standard(StandardField::Activity) => Some(ActuationSignal {
                kind: ActuationKind::RoomActivityChange,
                value: value.to_string(),
                target_device_key: standard.activity_set_device_key().map(str::to_string),
                function: standard
                    .activity_mapping
                    .as_ref()
                    .and_then(|activity| activity.function_for(value))
                    .map(str::to_string),
                affected_devices: Vec::new(),
            }),
            _ => None,
        }
    }

    /// 上报侧初始状态：配置中的标签、描述与版本。
    pub fn seed_reported(&self) -> State {
        let config = &self.config;
        let mut state = State::new(
            config.api_version.clone(),
            config.device_slots,
            config.custom_slots,
        );
        state.standard.version = config.standard_properties.version.clone();
        for mapping in &config.device_mappings {
            if let Some(slot) = state.status.devices.get_mut(mapping.device_index) {
                slot.label = mapping.label().to_string();
                slot.description = mapping.description.clone().unwrap_or_default();
            }
        }
        for custom in &config.standard_properties.custom_property_mappings {
            let index = domain::parse_slot_key(domain::PROPERTY_KEY_PREFIX, &custom.property_key);
            if let Some(slot) = index.and_then(|index| state.custom.get_mut(index)) {
                slot.label = custom.label.clone().unwrap_or_default();
            }
        }
        state
    }

    fn check_device_index(&self, index: usize) -> Result<(), ResolveError> {
        if index < 1 || index > self.config.device_slots {
            return Err(ResolveError::InvalidIndex {
                index,
                slots: self.config.device_slots,
            });
        }
        Ok(())
    }
}

fn route(
    context: &str,
    mapping: &PropertyMapping,
    fallback: Option<FieldPath>,
) -> Result<PropertyRoute, ConfigError> {
    let target = mapping
        .target(fallback)
        .map_err(|_| ConfigError::UnknownPropertyPath {
            context: context.to_string(),
            path: mapping.property_path.clone().unwrap_or_default(),
        })?;
    Ok(PropertyRoute {
        mapping: mapping.clone(),
        target,
    })
}

/// 值类型与目标字段一致时原样使用；文本按目标类型转换。
fn coerce(path: FieldPath, value: &FieldValue) -> Result<ResolvedWrite, ResolveError> {
    let expected = path.kind();
    if value.kind() == expected {
        return Ok(ResolvedWrite {
            path,
            value: value.clone(),
        });
    }
    let converted = match value {
        FieldValue::Text(raw) => FieldValue::parse_as(expected, raw),
        _ => None,
    };
    converted
        .map(|value| ResolvedWrite { path, value })
        .ok_or(ResolveError::KindMismatch {
            path,
            expected,
            found: value.kind(),
        })
}

/// 房间开关反馈属性；房间状态按 "On"/"Off" 呈现。
const ROOM_ON_PROPERTIES: [&str; 5] = ["on", "ison", "onfeedback", "roomison", "roomisonfeedback"];

const OCCUPANCY_PROPERTIES: [&str; 5] = [
    "occupied",
    "occupancy",
    "isoccupied",
    "roomisoccupied",
    "roomisoccupiedfeedback",
];

const HELP_PROPERTIES: [&str; 2] = ["helpmessage", "helprequest"];

fn role_write(field: StandardField, raw: &str) -> Result<ResolvedWrite, ResolveError> {
    let path = FieldPath::Standard(field);
    if field != StandardField::State {
        return coerce(path, &FieldValue::text(raw));
    }
    match FieldValue::parse_as(FieldKind::Flag, raw) {
        Some(FieldValue::Flag(on)) => Ok(ResolvedWrite {
            path,
            value: FieldValue::text(if on { "On" } else { "Off" }),
        }),
        _ => Err(ResolveError::KindMismatch {
            path,
            expected: FieldKind::Flag,
            found: FieldKind::Text,
        }),
    }
}

fn unmapped(device_key: &str, property: &str) -> ResolveError {
    ResolveError::UnmappedProperty {
        device_key: device_key.to_string(),
        property: property.to_string(),
    }
}
