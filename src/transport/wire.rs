//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求与响应信封的线上格式。

use crate::request::{Operation, Request, Verb};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 请求信封：`{ format, ops: [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub format: String,
    pub ops: Vec<WireOperation>,
}

/// 线上的单个操作
///
/// `value` 只在 CREATE/UPDATE/EXECUTE 时出现；`options` 不含本地选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOperation {
    pub verb: Verb,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl From<&Operation> for WireOperation {
    fn from(op: &Operation) -> Self {
        let value = if op.verb().carries_value() {
            // JSON 中缺省值与 null 无法区分，统一发送 null
            Some(op.value().cloned().unwrap_or(Value::Null))
        } else {
            None
        };
        Self {
            verb: op.verb(),
            key: op.key().to_string(),
            value,
            options: op.options().remote(),
            params: op.params().cloned(),
        }
    }
}

impl RequestEnvelope {
    /// 用请求中指定下标的操作构建信封
    pub fn for_operations(format: &str, request: &Request, indices: &[usize]) -> Self {
        Self {
            format: format.to_string(),
            ops: indices
                .iter()
                .filter_map(|&i| request.ops().get(i))
                .map(WireOperation::from)
                .collect(),
        }
    }
}

/// 响应信封：`{ ops: [...] }`，条目与请求按位置对齐
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub ops: Vec<Value>,
}

impl ResponseEnvelope {
    /// 第 `index` 个响应条目
    pub fn entry(&self, index: usize) -> Option<&Value> {
        self.ops.get(index)
    }
}
