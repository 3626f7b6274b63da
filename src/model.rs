//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了带类型属性的模型：字段类型推断、值的类型转换以及模型实例化。
//!
//! 模型实例以 JSON 对象表示：先填入声明的默认值，再按声明类型转换传入的属性。

use crate::error::{KojacError, Result};
use serde_json::{Map, Number, Value};
use std::fmt;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Null,
    Int,
    Number,
    String,
    Boolean,
    Array,
    Object,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Null => "Null",
            FieldType::Int => "Int",
            FieldType::Number => "Number",
            FieldType::String => "String",
            FieldType::Boolean => "Boolean",
            FieldType::Array => "Array",
            FieldType::Object => "Object",
        };
        f.write_str(name)
    }
}

/// 推断值的字段类型
///
/// 没有小数部分的数字视为 `Int`
pub fn value_type(value: &Value) -> FieldType {
    match value {
        Value::Null => FieldType::Null,
        Value::Bool(_) => FieldType::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0) {
                FieldType::Int
            } else {
                FieldType::Number
            }
        }
        Value::String(_) => FieldType::String,
        Value::Array(_) => FieldType::Array,
        Value::Object(_) => FieldType::Object,
    }
}

/// 把值解释为目标类型
///
/// 无法转换时返回 `Value::Null`。类型相同时原样返回
pub fn interpret_value_as_type(value: &Value, dest: FieldType) -> Value {
    let source = value_type(value);
    if source == dest {
        return value.clone();
    }
    match dest {
        FieldType::String => match value {
            Value::Bool(b) => Value::String(b.to_string()),
            Value::Number(n) => Value::String(number_to_string(n)),
            _ => Value::Null,
        },
        FieldType::Boolean => match value {
            Value::Number(n) => n.as_f64().map_or(Value::Null, |f| Value::Bool(f != 0.0)),
            _ => Value::Null,
        },
        FieldType::Number => match value {
            Value::Bool(b) => Value::from(u8::from(*b)),
            Value::Number(_) => value.clone(),
            Value::String(s) => parse_number(s).map_or(Value::Null, float_value),
            _ => Value::Null,
        },
        FieldType::Int => match value {
            Value::Bool(b) => Value::from(u8::from(*b)),
            Value::Number(n) => n.as_f64().map_or(Value::Null, round_value),
            Value::String(s) => parse_number(s).map_or(Value::Null, round_value),
            _ => Value::Null,
        },
        FieldType::Null | FieldType::Array | FieldType::Object => Value::Null,
    }
}

fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if !n.is_i64() && !n.is_u64() && f.fract() == 0.0 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

// 空白字符串视为 0
fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn float_value(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

fn round_value(f: f64) -> Value {
    // 与 Math.round 一致：.5 向正无穷取整
    float_value((f + 0.5).floor())
}

/// 模型属性
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub field_type: FieldType,
    pub default: Value,
}

/// 模型定义
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    name: String,
    attributes: Vec<Attribute>,
    allow_dynamic: bool,
}

impl ModelDefinition {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            attributes: Vec::new(),
            allow_dynamic: true,
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn is_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn allow_dynamic(&self) -> bool {
        self.allow_dynamic
    }

    /// 以属性值创建模型实例
    ///
    /// 非对象值原样返回
    pub fn instantiate(&self, values: &Value) -> Value {
        let Value::Object(source) = values else {
            return values.clone();
        };
        let mut instance = Map::new();
        for attribute in &self.attributes {
            instance.insert(attribute.name.clone(), attribute.default.clone());
        }
        for (name, value) in source {
            match self.attribute(name) {
                Some(attribute) => {
                    instance.insert(
                        name.clone(),
                        interpret_value_as_type(value, attribute.field_type),
                    );
                }
                None if self.allow_dynamic => {
                    instance.insert(name.clone(), value.clone());
                }
                None => {}
            }
        }
        Value::Object(instance)
    }
}

/// 模型定义构建器
///
/// 第一个错误会被记录，在 [`ModelBuilder::build`] 时返回
#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    attributes: Vec<Attribute>,
    allow_dynamic: bool,
    error: Option<String>,
}

impl ModelBuilder {
    /// 声明类型，默认值为 null
    pub fn attribute(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.push(name.into(), field_type, Value::Null)
    }

    /// 声明类型和默认值
    pub fn attribute_with_default(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        default: impl Into<Value>,
    ) -> Self {
        let name = name.into();
        let default = default.into();
        let coerced = interpret_value_as_type(&default, field_type);
        if coerced.is_null() && !default.is_null() {
            self.fail(format!(
                "{}.{}: default {} is not a valid {}",
                self.name, name, default, field_type
            ));
            return self;
        }
        self.push(name, field_type, coerced)
    }

    /// 只给默认值，类型由默认值推断
    pub fn attribute_default(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        let field_type = value_type(&default);
        self.push(name.into(), field_type, default)
    }

    /// 是否复制未声明的属性，默认 true
    pub fn allow_dynamic(mut self, allow: bool) -> Self {
        self.allow_dynamic = allow;
        self
    }

    pub fn build(self) -> Result<ModelDefinition> {
        if let Some(error) = self.error {
            return Err(KojacError::ModelError(error));
        }
        Ok(ModelDefinition {
            name: self.name,
            attributes: self.attributes,
            allow_dynamic: self.allow_dynamic,
        })
    }

    fn push(mut self, name: String, field_type: FieldType, default: Value) -> Self {
        if name.is_empty() {
            self.fail(format!("{}: empty attribute name", self.name));
        } else if self.attributes.iter().any(|a| a.name == name) {
            self.fail(format!("{}.{}: duplicate attribute", self.name, name));
        } else {
            self.attributes.push(Attribute {
                name,
                field_type,
                default,
            });
        }
        self
    }

    fn fail(&mut self, error: String) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}
