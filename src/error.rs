//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求、操作与流水线的错误类型。

use serde_json::Value;
use thiserror::Error;

use crate::request::Request;

/// 库级错误类型枚举
///
/// 覆盖配置、IO、网络、序列化以及被拒绝的请求
#[derive(Error, Debug)]
pub enum KojacError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 构建请求时的输入错误
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 模型定义错误
    #[error("Model definition error: {0}")]
    ModelError(String),

    /// 缓存后端错误
    #[error("Cache backend error: {0}")]
    CacheError(String),

    /// 操作不支持
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// 传输层错误
    #[error("Transport error: {0}")]
    TransportError(String),

    /// HTTP错误
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON错误
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// 流水线被拒绝，携带已部分填充的请求
    #[error("Request rejected: {}", describe_rejection(.0))]
    Rejected(Box<Request>),
}

fn describe_rejection(request: &Request) -> String {
    request
        .error()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown error".to_string())
}

/// 单个操作的错误
///
/// 保存在 `Operation::error` 中，并在请求结束时汇总为请求错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperationError {
    /// 服务端为该操作返回的错误
    #[error("remote error for '{key}': {detail}")]
    Remote { key: String, detail: Value },

    /// 响应中没有对应的条目
    #[error("no result returned for '{key}'")]
    NoResult { key: String },

    /// 传输失败
    #[error("transport failure: {0}")]
    Transport(String),
}

/// 流水线上下文中的错误
///
/// 一旦设置，剩余阶段全部跳过，流水线进入 Rejected 状态
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// 阶段返回了错误
    #[error("stage failed: {0}")]
    Stage(String),

    /// 阶段执行时发生 panic
    #[error("stage panicked: {0}")]
    Panicked(String),

    /// 阶段挂起后其 Resumer 被丢弃，未再继续
    #[error("suspended stage was abandoned without resuming")]
    Abandoned,

    /// 同一流水线已在执行
    #[error("pipeline is already executing")]
    AlreadyRunning,

    /// 操作错误
    #[error(transparent)]
    Operation(#[from] OperationError),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, KojacError>;
