//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了对象工厂：按键匹配模型，把原始结果塑造成模型实例。

use crate::error::{KojacError, Result};
use crate::model::ModelDefinition;
use crate::request::Request;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// 对象工厂
///
/// 规则按注册顺序匹配，第一个匹配键的模式胜出；都不匹配时使用默认模型，
/// 没有默认模型则保持原值
#[derive(Debug, Clone, Default)]
pub struct ObjectFactory {
    matchers: Vec<(Regex, Arc<ModelDefinition>)>,
    default_model: Option<Arc<ModelDefinition>>,
}

impl ObjectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册一条 (模式, 模型) 规则
    pub fn register(&mut self, pattern: &str, model: Arc<ModelDefinition>) -> Result<()> {
        let re = Regex::new(pattern)
            .map_err(|e| KojacError::ModelError(format!("invalid pattern '{}': {}", pattern, e)))?;
        debug!("factory rule registered: {} -> {}", pattern, model.name());
        self.matchers.push((re, model));
        Ok(())
    }

    pub fn with_rule(mut self, pattern: &str, model: Arc<ModelDefinition>) -> Result<Self> {
        self.register(pattern, model)?;
        Ok(self)
    }

    pub fn set_default_model(&mut self, model: Option<Arc<ModelDefinition>>) {
        self.default_model = model;
    }

    pub fn with_default_model(mut self, model: Arc<ModelDefinition>) -> Self {
        self.default_model = Some(model);
        self
    }

    /// 键对应的模型
    pub fn model_for_key(&self, key: &str) -> Option<&Arc<ModelDefinition>> {
        self.matchers
            .iter()
            .find(|(re, _)| re.is_match(key))
            .map(|(_, model)| model)
            .or(self.default_model.as_ref())
    }

    /// 把一个值塑造成模型实例
    ///
    /// 对象按模型实例化，数组逐元素处理，标量保持不变
    pub fn manufacture(&self, value: &Value, key: &str) -> Value {
        let Some(model) = self.model_for_key(key) else {
            return value.clone();
        };
        match value {
            Value::Object(_) => model.instantiate(value),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| match item {
                        Value::Object(_) => model.instantiate(item),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// 塑造请求中所有未出错操作的结果
    pub fn shape_results(&self, request: &mut Request) {
        for op in request.ops_mut() {
            if op.error().is_some() {
                continue;
            }
            for (key, value) in op.results_mut().iter_mut() {
                if let Some(v) = value {
                    if matches!(v, Value::Object(_) | Value::Array(_)) {
                        *v = self.manufacture(v, key);
                    }
                }
            }
        }
    }
}
