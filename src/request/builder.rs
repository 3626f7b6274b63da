//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了请求的链式构建器。

use super::operation::{Operation, OperationOptions, Verb};
use super::Request;
use crate::client::Kojac;
use crate::error::{KojacError, Result};
use crate::pipeline::Pipeline;
use serde_json::{Map, Value};

/// 规范化后的 (键, 值) 序列
///
/// 支持单个键、键数组、逗号分隔的键、[键, 值] 对数组以及键值对象
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyValues {
    pairs: Vec<(String, Option<Value>)>,
    invalid: Option<String>,
}

impl KeyValues {
    pub fn pairs(&self) -> &[(String, Option<Value>)] {
        &self.pairs
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    fn keys_only<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pairs: keys.into_iter().map(|k| (k.into(), None)).collect(),
            invalid: None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            pairs: Vec::new(),
            invalid: Some(reason.into()),
        }
    }
}

/// 把逗号分隔的字符串拆成键
pub fn interpret_keys(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<&str> for KeyValues {
    fn from(keys: &str) -> Self {
        Self::keys_only(interpret_keys(keys))
    }
}

impl From<String> for KeyValues {
    fn from(keys: String) -> Self {
        Self::from(keys.as_str())
    }
}

impl From<Vec<&str>> for KeyValues {
    fn from(keys: Vec<&str>) -> Self {
        Self::keys_only(keys)
    }
}

impl From<Vec<String>> for KeyValues {
    fn from(keys: Vec<String>) -> Self {
        Self::keys_only(keys)
    }
}

impl From<&[&str]> for KeyValues {
    fn from(keys: &[&str]) -> Self {
        Self::keys_only(keys.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for KeyValues {
    fn from(keys: [&str; N]) -> Self {
        Self::keys_only(keys)
    }
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for KeyValues {
    fn from((key, value): (K, V)) -> Self {
        Self {
            pairs: vec![(key.into(), Some(value.into()))],
            invalid: None,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> From<Vec<(K, V)>> for KeyValues {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
            invalid: None,
        }
    }
}

impl From<Map<String, Value>> for KeyValues {
    fn from(map: Map<String, Value>) -> Self {
        Self {
            pairs: map.into_iter().map(|(k, v)| (k, Some(v))).collect(),
            invalid: None,
        }
    }
}

impl From<Value> for KeyValues {
    fn from(value: Value) -> Self {
        match value {
            Value::String(keys) => Self::from(keys),
            Value::Object(map) => Self::from(map),
            Value::Array(items) => from_array(items),
            other => Self::invalid(format!("unrecognised key/value input: {}", other)),
        }
    }
}

fn from_array(items: Vec<Value>) -> KeyValues {
    let mut pairs = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(key) => pairs.push((key, None)),
            Value::Array(pair) => {
                let mut pair = pair.into_iter();
                match (pair.next(), pair.next()) {
                    (Some(Value::String(key)), value) => pairs.push((key, value)),
                    _ => return KeyValues::invalid("expected [key, value] pairs"),
                }
            }
            Value::Object(map) => pairs.extend(map.into_iter().map(|(k, v)| (k, Some(v)))),
            other => return KeyValues::invalid(format!("unrecognised key: {}", other)),
        }
    }
    KeyValues {
        pairs,
        invalid: None,
    }
}

/// 单次动词调用的选项
///
/// `result_key` 与 `params` 会被提取出来，其余选项附加到每个生成的操作上
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    result_key: Option<String>,
    params: Option<Map<String, Value>>,
    cache_results: Option<bool>,
    prefer_cache: Option<bool>,
    extra: Map<String, Value>,
    invalid: Option<String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 覆盖第一个生成的操作的结果键
    pub fn result_key(mut self, key: impl Into<String>) -> Self {
        self.result_key = Some(key.into());
        self
    }

    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    pub fn cache_results(mut self, enabled: bool) -> Self {
        self.cache_results = Some(enabled);
        self
    }

    pub fn prefer_cache(mut self, enabled: bool) -> Self {
        self.prefer_cache = Some(enabled);
        self
    }

    /// 设置一个选项
    ///
    /// 本地标志按真值解释，`result_key` 与 `params` 被提取；
    /// 这些保留名从不透传给服务端，其余选项原样透传
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "cacheResults" | "cache_results" => self.cache_results = Some(truthy(&value)),
            "preferCache" | "prefer_cache" => self.prefer_cache = Some(truthy(&value)),
            "result_key" => match value {
                Value::String(k) => self.result_key = Some(k),
                Value::Null => self.result_key = None,
                other => self.fail(format!("result_key must be a string, got {}", other)),
            },
            "params" => match value {
                Value::Object(p) => self.params = Some(p),
                Value::Null => self.params = None,
                other => self.fail(format!("params must be an object, got {}", other)),
            },
            _ => {
                self.extra.insert(key, value);
            }
        }
        self
    }

    fn fail(&mut self, reason: String) {
        if self.invalid.is_none() {
            self.invalid = Some(reason);
        }
    }

    fn resolve(&self, verb: Verb) -> OperationOptions {
        OperationOptions {
            cache_results: self.cache_results.unwrap_or(verb.caches_by_default()),
            prefer_cache: self.prefer_cache.unwrap_or(false),
            extra: self.extra.clone(),
        }
    }
}

impl From<Value> for CallOptions {
    fn from(value: Value) -> Self {
        let mut options = CallOptions::default();
        match value {
            Value::Object(map) => {
                for (key, value) in map {
                    options = options.option(key, value);
                }
            }
            Value::Null => {}
            other => options.fail(format!("options must be an object, got {}", other)),
        }
        options
    }
}

// 与 JSON 真值一致：null、false、0、空串为假
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// 请求构建器
///
/// 每次动词调用按输入顺序为每个 (键, 值) 生成一个操作；输入错误会被记录，
/// 在 [`RequestBuilder::request`] 时返回，此时不会执行任何阶段
pub struct RequestBuilder {
    kojac: Kojac,
    request: Request,
    pipeline: Pipeline<Request>,
    input_error: Option<KojacError>,
}

impl RequestBuilder {
    pub(crate) fn new(kojac: Kojac) -> Self {
        Self {
            kojac,
            request: Request::new(),
            pipeline: Pipeline::new(),
            input_error: None,
        }
    }

    pub fn create(self, key_values: impl Into<KeyValues>) -> Self {
        self.create_with(key_values, CallOptions::default())
    }

    pub fn create_with(self, key_values: impl Into<KeyValues>, options: CallOptions) -> Self {
        self.append(Verb::Create, key_values.into(), options)
    }

    pub fn read(self, keys: impl Into<KeyValues>) -> Self {
        self.read_with(keys, CallOptions::default())
    }

    pub fn read_with(self, keys: impl Into<KeyValues>, options: CallOptions) -> Self {
        self.append(Verb::Read, keys.into(), options)
    }

    /// 优先使用缓存的读取
    pub fn cache_read(self, keys: impl Into<KeyValues>) -> Self {
        self.cache_read_with(keys, CallOptions::default())
    }

    pub fn cache_read_with(self, keys: impl Into<KeyValues>, options: CallOptions) -> Self {
        self.append(Verb::Read, keys.into(), options.prefer_cache(true))
    }

    pub fn update(self, key_values: impl Into<KeyValues>) -> Self {
        self.update_with(key_values, CallOptions::default())
    }

    pub fn update_with(self, key_values: impl Into<KeyValues>, options: CallOptions) -> Self {
        self.append(Verb::Update, key_values.into(), options)
    }

    pub fn destroy(self, keys: impl Into<KeyValues>) -> Self {
        self.destroy_with(keys, CallOptions::default())
    }

    pub fn destroy_with(self, keys: impl Into<KeyValues>, options: CallOptions) -> Self {
        self.append(Verb::Destroy, keys.into(), options)
    }

    pub fn execute(self, key_values: impl Into<KeyValues>) -> Self {
        self.execute_with(key_values, CallOptions::default())
    }

    pub fn execute_with(self, key_values: impl Into<KeyValues>, options: CallOptions) -> Self {
        self.append(Verb::Execute, key_values.into(), options)
    }

    fn append(mut self, verb: Verb, key_values: KeyValues, options: CallOptions) -> Self {
        if self.input_error.is_some() {
            return self;
        }
        if let Some(reason) = key_values.invalid.or_else(|| options.invalid.clone()) {
            self.input_error = Some(KojacError::InvalidInput(format!("{}: {}", verb, reason)));
            return self;
        }
        if key_values.pairs.iter().any(|(k, _)| k.is_empty()) {
            self.input_error = Some(KojacError::InvalidInput(format!(
                "{}: empty key",
                verb
            )));
            return self;
        }

        let op_options = options.resolve(verb);
        for (i, (key, value)) in key_values.pairs.into_iter().enumerate() {
            let result_key = if i == 0 {
                options.result_key.clone()
            } else {
                None
            };
            self.request.push_operation(Operation::new(
                verb,
                key,
                value,
                op_options.clone(),
                options.params.clone(),
                result_key,
            ));
        }
        self
    }

    /// 已生成的操作
    pub fn operations(&self) -> &[Operation] {
        self.request.ops()
    }

    /// 该请求的流水线，可在 `request()` 之前追加自定义阶段
    pub fn pipeline(&self) -> &Pipeline<Request> {
        &self.pipeline
    }

    /// 执行请求
    ///
    /// 流水线被拒绝时返回 [`KojacError::Rejected`]，其中包含部分填充的请求
    pub async fn request(self) -> Result<Request> {
        if let Some(error) = self.input_error {
            return Err(error);
        }
        self.kojac.perform_request(self.request, self.pipeline).await
    }
}
