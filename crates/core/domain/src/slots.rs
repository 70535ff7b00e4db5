//! 固定容量的槽位表。
//!
//! 槽位按 1 起始的整数索引寻址，容量在配置加载时确定，运行期不会重新编号。

use serde::ser::{Serialize, SerializeMap, Serializer};

/// 按索引校验的有界槽位容器。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotTable<T> {
    key_prefix: &'static str,
    slots: Vec<T>,
}

impl<T: Default> SlotTable<T> {
    /// 创建 `capacity` 个默认值槽位。
    pub fn new(key_prefix: &'static str, capacity: usize) -> Self {
        Self {
            key_prefix,
            slots: (0..capacity).map(|_| T::default()).collect(),
        }
    }
}

impl<T> SlotTable<T> {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// 索引是否落在 1..=len 内。
    pub fn contains(&self, index: usize) -> bool {
        index >= 1 && index <= self.slots.len()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        index.checked_sub(1).and_then(|i| self.slots.get(i))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        index.checked_sub(1).and_then(|i| self.slots.get_mut(i))
    }

    /// 按索引顺序遍历 `(index, slot)`。
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().map(|(i, slot)| (i + 1, slot))
    }

    pub fn key_prefix(&self) -> &'static str {
        self.key_prefix
    }

    /// 槽位在线上格式中的 key，例如 `device3`。
    pub fn slot_key(&self, index: usize) -> String {
        format!("{}{}", self.key_prefix, index)
    }
}

impl<T: Serialize> Serialize for SlotTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (index, slot) in self.iter() {
            map.serialize_entry(&self.slot_key(index), slot)?;
        }
        map.end()
    }
}

/// 解析槽位 key：接受 `device3`（前缀不区分大小写）或纯数字 `3`。
///
/// 只做语法解析，不校验范围；索引 0 也会原样返回。
pub fn parse_slot_key(prefix: &str, key: &str) -> Option<usize> {
    let key = key.trim();
    let digits = if key.len() > prefix.len()
        && key.is_char_boundary(prefix.len())
        && key[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        &key[prefix.len()..]
    } else {
        key
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_key_accepts_prefix_and_bare_index() {
        assert_eq!(parse_slot_key("device", "device7"), Some(7));
        assert_eq!(parse_slot_key("device", "Device12"), Some(12));
        assert_eq!(parse_slot_key("device", "4"), Some(4));
        assert_eq!(parse_slot_key("device", "device"), None);
        assert_eq!(parse_slot_key("device", "devicex"), None);
        assert_eq!(parse_slot_key("property", "device1"), None);
    }

    #[test]
    fn slot_table_is_one_based() {
        let mut table: SlotTable<u16> = SlotTable::new("device", 3);
        assert!(!table.contains(0));
        assert!(table.contains(3));
        assert!(!table.contains(4));
        *table.get_mut(3).expect("slot 3") = 9;
        assert_eq!(table.get(3), Some(&9));
        assert!(table.get(0).is_none());
        assert_eq!(table.slot_key(2), "device2");
    }
}
