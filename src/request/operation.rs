//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了单个 CRUD/执行操作。

use super::results::ResultMap;
use crate::error::OperationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::debug;

/// 操作动词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Create,
    Read,
    Update,
    Destroy,
    Execute,
}

impl Verb {
    /// 该动词是否携带值
    pub fn carries_value(self) -> bool {
        match self {
            Verb::Create | Verb::Update | Verb::Execute => true,
            Verb::Read | Verb::Destroy => false,
        }
    }

    /// `cacheResults` 的默认值
    pub fn caches_by_default(self) -> bool {
        match self {
            Verb::Execute => false,
            Verb::Create | Verb::Read | Verb::Update | Verb::Destroy => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "CREATE",
            Verb::Read => "READ",
            Verb::Update => "UPDATE",
            Verb::Destroy => "DESTROY",
            Verb::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 操作选项
///
/// `cache_results` 与 `prefer_cache` 只在本地生效，`extra` 原样发送给服务端
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationOptions {
    pub cache_results: bool,
    pub prefer_cache: bool,
    pub extra: Map<String, Value>,
}

impl OperationOptions {
    /// 发送给服务端的选项（去掉本地选项），为空时返回 `None`
    pub fn remote(&self) -> Option<Map<String, Value>> {
        if self.extra.is_empty() {
            None
        } else {
            Some(self.extra.clone())
        }
    }
}

/// 单个操作
#[derive(Debug, Clone)]
pub struct Operation {
    verb: Verb,
    key: String,
    value: Option<Value>,
    options: OperationOptions,
    params: Option<Map<String, Value>>,
    result_key: String,
    // CREATE 未显式指定 result_key 时采用服务端返回的键
    adopt_server_key: bool,
    results: ResultMap,
    result: Option<Value>,
    error: Option<OperationError>,
    performed: bool,
    from_cache: Option<bool>,
}

impl Operation {
    pub(crate) fn new(
        verb: Verb,
        key: String,
        value: Option<Value>,
        options: OperationOptions,
        params: Option<Map<String, Value>>,
        result_key: Option<String>,
    ) -> Self {
        let adopt_server_key = verb == Verb::Create && result_key.is_none();
        let result_key = result_key.unwrap_or_else(|| key.clone());
        Self {
            verb,
            key,
            value: if verb.carries_value() { value } else { None },
            options,
            params,
            result_key,
            adopt_server_key,
            results: ResultMap::new(),
            result: None,
            error: None,
            performed: false,
            from_cache: None,
        }
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn options(&self) -> &OperationOptions {
        &self.options
    }

    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref()
    }

    /// 主结果所在的键
    pub fn result_key(&self) -> &str {
        &self.result_key
    }

    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    pub fn results_mut(&mut self) -> &mut ResultMap {
        &mut self.results
    }

    /// 派生结果：`results[result_key]`，出错时为 `None`
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, error: OperationError) {
        self.error = Some(error);
    }

    pub fn performed(&self) -> bool {
        self.performed
    }

    /// `None` 表示尚未执行
    pub fn from_cache(&self) -> Option<bool> {
        self.from_cache
    }

    pub fn is_cacheable(&self) -> bool {
        self.options.cache_results
    }

    /// 标记为已执行；performed/from_cache 只写一次，重复调用返回 `false`
    pub fn mark_performed(&mut self, from_cache: bool) -> bool {
        if self.performed {
            debug!(key = %self.key, "operation already performed, ignoring");
            return false;
        }
        self.performed = true;
        self.from_cache = Some(from_cache);
        true
    }

    /// 以缓存值完成该操作
    pub(crate) fn resolve_from_cache(
        &mut self,
        primary: Value,
        companions: Vec<(String, Option<Value>)>,
    ) -> bool {
        if !self.mark_performed(true) {
            return false;
        }
        self.results.insert(self.result_key.clone(), Some(primary));
        for (key, value) in companions {
            self.results.insert(key, value);
        }
        true
    }

    /// 应用服务端对该操作的响应条目
    ///
    /// 条目不是对象，或其 `results` 不是对象时，视为主结果本身
    pub fn receive_result(&mut self, entry: Option<&Value>) {
        let Some(entry) = entry.filter(|v| !v.is_null()) else {
            self.error = Some(OperationError::NoResult {
                key: self.key.clone(),
            });
            return;
        };

        let (response_key, raw_results) = match entry {
            Value::Object(obj) => {
                if let Some(detail) = obj.get("error").filter(|e| is_error_value(e)) {
                    self.error = Some(OperationError::Remote {
                        key: self.key.clone(),
                        detail: detail.clone(),
                    });
                    return;
                }
                let response_key = obj
                    .get("result_key")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| self.key.clone());
                (response_key, obj.get("results").cloned())
            }
            other => (self.key.clone(), Some(other.clone())),
        };

        let mut results = match raw_results {
            Some(Value::Object(map)) => ResultMap::from(map),
            Some(other) => {
                let mut single = ResultMap::new();
                single.insert(response_key.clone(), Some(other));
                single
            }
            None => ResultMap::new(),
        };

        let primary = results.remove(&response_key).flatten();
        let final_key = if self.adopt_server_key {
            response_key
        } else {
            self.result_key.clone()
        };
        self.results.extend(&results);
        self.results.insert(final_key.clone(), primary);
        self.result_key = final_key;
    }

    /// 除主结果外的所有键
    pub fn companion_keys(&self) -> Vec<String> {
        self.results
            .keys()
            .filter(|k| *k != self.result_key)
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn finalize_result(&mut self) {
        self.result = if self.error.is_some() {
            None
        } else {
            self.results.get(&self.result_key).cloned()
        };
    }
}

// 与服务端约定一致：null、false、0 与空串都表示没有错误
fn is_error_value(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}
