//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了按插入顺序保存的结果表。

use serde_json::{Map, Value};

/// 结果表
///
/// 键保持插入顺序；值为 `None` 表示“未定义”，写入缓存时视为删除（tombstone），
/// 与 JSON `null` 区分开。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultMap {
    entries: Vec<(String, Option<Value>)>,
}

impl ResultMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入条目；已存在的键保持原位置，只替换值
    pub fn insert(&mut self, key: impl Into<String>, value: Option<Value>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// 键是否存在（包括未定义的条目）
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// 读取值；不存在或未定义时返回 `None`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_ref())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Option<Value>> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, key: &str) -> Option<Option<Value>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// 从左到右合并，右侧覆盖同名键
    pub fn extend(&mut self, other: &ResultMap) {
        for (k, v) in &other.entries {
            self.insert(k.clone(), v.clone());
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Option<Value>)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 转换为 JSON 对象，未定义的条目被省略
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .filter_map(|(k, v)| v.clone().map(|v| (k.clone(), v)))
            .collect();
        Value::Object(map)
    }
}

impl From<Map<String, Value>> for ResultMap {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            entries: map.into_iter().map(|(k, v)| (k, Some(v))).collect(),
        }
    }
}

impl FromIterator<(String, Option<Value>)> for ResultMap {
    fn from_iter<I: IntoIterator<Item = (String, Option<Value>)>>(iter: I) -> Self {
        let mut map = ResultMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
