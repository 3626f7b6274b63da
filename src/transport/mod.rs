//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了远程传输接口及其实现。

pub mod http;
pub mod mock_file;
pub mod wire;

pub use http::HttpTransport;
pub use mock_file::MockFileTransport;
pub use wire::{RequestEnvelope, ResponseEnvelope, WireOperation};

use crate::config::RemoteConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// 远程传输特征
///
/// 一次往返发送一批操作；响应的 `ops` 必须与请求的 `ops` 按位置对齐。
/// 超时与取消都属于传输层自己的职责
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// 发送一个请求信封
    async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope>;
}

/// 按配置创建传输层；配置了 mock 目录时使用文件传输
pub fn from_config(config: &RemoteConfig) -> Result<Arc<dyn Transport>> {
    match &config.mock {
        Some(mock) => Ok(Arc::new(MockFileTransport::new(&mock.path))),
        None => Ok(Arc::new(HttpTransport::new(
            &config.server_path,
            config.timeout_ms,
        )?)),
    }
}
