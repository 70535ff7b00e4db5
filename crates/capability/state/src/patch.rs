//! 合并补丁（merge patch）应用。
//!
//! 补丁文档与 [`State`] 同形，key 不区分大小写；`null` 表示不修改。
//! 设备与自定义属性集合可以是以 `deviceN` / `N` 为 key 的对象，
//! 也可以是数组（位置 k 对应槽位 k+1）。任意一处出错则整个补丁作废，
//! 目标状态保持不变。

use domain::{
    CustomField, DEVICE_KEY_PREFIX, DeviceProperty, FieldKind, FieldPath, FieldValue,
    PROPERTY_KEY_PREFIX, StandardField, State, WriteError, parse_slot_key,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// 补丁错误；出现任意错误时整个补丁被丢弃。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("slot {index} out of range at {path}")]
    OutOfRange { path: String, index: usize },
    #[error("type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: FieldKind,
        found: &'static str,
    },
    #[error("unknown field: {path}")]
    UnknownField { path: String },
    #[error("expected object at {path}")]
    NotAnObject { path: String },
}

/// 与状态同形的部分更新文档。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchDocument(Value);

impl PatchDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// 空补丁 `{}`。
    pub fn empty() -> Self {
        Self(Value::Object(Map::new()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for PatchDocument {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for PatchDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// 补丁应用结果。
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub state: Arc<State>,
    /// 补丁中出现过非 null 值的全限定路径，值未变化也计入。
    pub written: BTreeSet<FieldPath>,
    /// `written` 中值真正发生变化的子集。
    pub diff: BTreeSet<FieldPath>,
}

/// 单次补丁在副本上的应用结果。
#[derive(Debug, Clone)]
pub struct AppliedPatch {
    pub next: State,
    pub written: BTreeSet<FieldPath>,
    pub diff: BTreeSet<FieldPath>,
}

/// 在目标状态的副本上应用补丁，返回新状态、写入集合与差异集合。
pub fn apply_patch(target: &State, patch: &PatchDocument) -> Result<AppliedPatch, PatchError> {
    let mut walker = PatchWalker {
        next: target.clone(),
        touched: BTreeSet::new(),
    };
    walker.apply_root(patch.as_value())?;

    let PatchWalker { next, touched } = walker;
    let diff = touched
        .iter()
        .filter(|path| target.get(path) != next.get(path))
        .cloned()
        .collect();
    Ok(AppliedPatch {
        next,
        written: touched,
        diff,
    })
}

struct PatchWalker {
    next: State,
    touched: BTreeSet<FieldPath>,
}

impl PatchWalker {
    fn apply_root(&mut self, root: &Value) -> Result<(), PatchError> {
        let root = match root {
            Value::Null => return Ok(()),
            Value::Object(map) => map,
            _ => return Err(not_an_object("$")),
        };
        for (key, value) in root {
            let block = key.to_ascii_lowercase();
            if !matches!(block.as_str(), "apiversion" | "standard" | "status" | "custom") {
                return Err(unknown(key));
            }
            if value.is_null() {
                continue;
            }
            match block.as_str() {
                "apiversion" => self.write(FieldPath::ApiVersion, value)?,
                "standard" => self.apply_standard(value)?,
                "status" => self.apply_status(value)?,
                _ => self.apply_custom(value)?,
            }
        }
        Ok(())
    }

    fn apply_standard(&mut self, block: &Value) -> Result<(), PatchError> {
        let block = as_object(block, "Standard")?;
        for (key, value) in block {
            let field = StandardField::from_name(key)
                .ok_or_else(|| unknown(&format!("Standard.{key}")))?;
            if value.is_null() {
                continue;
            }
            self.write(FieldPath::Standard(field), value)?;
        }
        Ok(())
    }

    fn apply_status(&mut self, block: &Value) -> Result<(), PatchError> {
        let block = as_object(block, "Status")?;
        for (key, value) in block {
            if !key.eq_ignore_ascii_case("devices") {
                return Err(unknown(&format!("Status.{key}")));
            }
            if value.is_null() {
                continue;
            }
            let slots = self.next.status.devices.len();
            for (index, slot) in slot_entries(value, DEVICE_KEY_PREFIX, slots, "Status.Devices")? {
                let base = format!("Status.Devices[{index}]");
                for (name, field_value) in as_object(slot, &base)? {
                    let property = DeviceProperty::from_name(name)
                        .ok_or_else(|| unknown(&format!("{base}.{name}")))?;
                    if field_value.is_null() {
                        continue;
                    }
                    self.write(FieldPath::device(index, property), field_value)?;
                }
            }
        }
        Ok(())
    }

    fn apply_custom(&mut self, block: &Value) -> Result<(), PatchError> {
        let slots = self.next.custom.len();
        for (index, slot) in slot_entries(block, PROPERTY_KEY_PREFIX, slots, "Custom")? {
            let base = format!("Custom.Properties[{index}]");
            for (name, field_value) in as_object(slot, &base)? {
                let field = CustomField::from_name(name)
                    .ok_or_else(|| unknown(&format!("{base}.{name}")))?;
                if field_value.is_null() {
                    continue;
                }
                self.write(FieldPath::custom(index, field), field_value)?;
            }
        }
        Ok(())
    }

    fn write(&mut self, path: FieldPath, raw: &Value) -> Result<(), PatchError> {
        let value = field_value(&path, raw)?;
        self.next.set(&path, value).map_err(|err| match err {
            WriteError::OutOfRange { path } => PatchError::OutOfRange {
                path: path.to_string(),
                index: slot_index(&path),
            },
            WriteError::KindMismatch { path, expected, found } => PatchError::TypeMismatch {
                path: path.to_string(),
                expected,
                found: found.name(),
            },
        })?;
        self.touched.insert(path);
        Ok(())
    }
}

/// 展开集合块为 `(槽位索引, 槽位补丁)`；`null` 条目跳过。
fn slot_entries<'a>(
    block: &'a Value,
    prefix: &str,
    slots: usize,
    base: &str,
) -> Result<Vec<(usize, &'a Value)>, PatchError> {
    let entries: Vec<(usize, &Value)> = match block {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                parse_slot_key(prefix, key)
                    .map(|index| (index, value))
                    .ok_or_else(|| unknown(&format!("{base}.{key}")))
            })
            .collect::<Result<_, _>>()?,
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(position, value)| (position + 1, value))
            .collect(),
        _ => return Err(not_an_object(base)),
    };

    let mut addressed = Vec::with_capacity(entries.len());
    for (index, value) in entries {
        if value.is_null() {
            continue;
        }
        if index < 1 || index > slots {
            return Err(PatchError::OutOfRange {
                path: format!("{base}[{index}]"),
                index,
            });
        }
        addressed.push((index, value));
    }
    Ok(addressed)
}

fn field_value(path: &FieldPath, raw: &Value) -> Result<FieldValue, PatchError> {
    let expected = path.kind();
    let converted = match (expected, raw) {
        (FieldKind::Text, Value::String(text)) => Some(FieldValue::Text(text.clone())),
        (FieldKind::Flag, Value::Bool(flag)) => Some(FieldValue::Flag(*flag)),
        (FieldKind::Count, Value::Number(number)) => number
            .as_u64()
            .and_then(|count| u16::try_from(count).ok())
            .map(FieldValue::Count),
        _ => None,
    };
    converted.ok_or_else(|| PatchError::TypeMismatch {
        path: path.to_string(),
        expected,
        found: value_type_name(raw),
    })
}

fn slot_index(path: &FieldPath) -> usize {
    match path {
        FieldPath::Device { index, .. } | FieldPath::Custom { index, .. } => *index,
        _ => 0,
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, PatchError> {
    value.as_object().ok_or_else(|| not_an_object(path))
}

fn unknown(path: &str) -> PatchError {
    PatchError::UnknownField {
        path: path.to_string(),
    }
}

fn not_an_object(path: &str) -> PatchError {
    PatchError::NotAnObject {
        path: path.to_string(),
    }
}

/// JSON 值的类型名，用于错误信息。
pub fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> State {
        State::new("1.0.0", 4, 2)
    }

    #[test]
    fn keys_match_case_insensitively() {
        for patch in [
            json!({"standard": {"activity": "Presenting"}}),
            json!({"Standard": {"Activity": "Presenting"}}),
            json!({"STANDARD": {"ACTIVITY": "Presenting"}}),
        ] {
            let AppliedPatch { next, diff, .. } =
                apply_patch(&state(), &PatchDocument::new(patch)).expect("apply");
            assert_eq!(next.standard.activity, "Presenting");
            assert_eq!(
                diff.into_iter().collect::<Vec<_>>(),
                vec![FieldPath::Standard(StandardField::Activity)]
            );
        }
    }

    #[test]
    fn array_collection_addresses_by_position() {
        let patch = json!({"status": {"devices": [null, {"status": "OK"}]}});
        let AppliedPatch { next, diff, .. } =
            apply_patch(&state(), &PatchDocument::new(patch)).expect("apply");
        assert_eq!(next.device(2).expect("slot 2").status, "OK");
        assert!(diff.contains(&FieldPath::device(2, DeviceProperty::Status)));
        assert_eq!(diff.len(), 1);
    }

    #[test]
    fn usage_overflow_is_a_type_mismatch() {
        let patch = json!({"status": {"devices": {"device1": {"usage": 70000}}}});
        let err = apply_patch(&state(), &PatchDocument::new(patch)).expect_err("overflow");
        assert_eq!(
            err,
            PatchError::TypeMismatch {
                path: "Status.Devices[1].Usage".to_string(),
                expected: FieldKind::Count,
                found: "number",
            }
        );
    }

    #[test]
    fn non_object_blocks_are_rejected() {
        let err = apply_patch(&state(), &PatchDocument::new(json!("x"))).expect_err("root");
        assert!(matches!(err, PatchError::NotAnObject { .. }));
        let err = apply_patch(&state(), &PatchDocument::new(json!({"standard": 3})))
            .expect_err("standard");
        assert_eq!(
            err,
            PatchError::NotAnObject {
                path: "Standard".to_string()
            }
        );
    }

    #[test]
    fn unknown_root_key_is_rejected_even_when_null() {
        let err = apply_patch(&state(), &PatchDocument::new(json!({"bogus": null})))
            .expect_err("unknown block");
        assert_eq!(
            err,
            PatchError::UnknownField {
                path: "bogus".to_string()
            }
        );
        let applied = apply_patch(&state(), &PatchDocument::new(json!({"Custom": null})))
            .expect("known block");
        assert!(applied.written.is_empty());
    }

    #[test]
    fn repeated_values_are_written_but_not_diffed() {
        let mut current = state();
        current.standard.state = "active".to_string();
        let applied = apply_patch(
            &current,
            &PatchDocument::new(json!({"standard": {"state": "active", "activity": null}})),
        )
        .expect("apply");
        assert!(applied.diff.is_empty());
        assert_eq!(
            applied.written.into_iter().collect::<Vec<_>>(),
            vec![FieldPath::Standard(StandardField::State)]
        );
    }
}
