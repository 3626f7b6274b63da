//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了从本地文件提供响应的模拟传输，用于离线开发与测试。

use super::{RequestEnvelope, ResponseEnvelope, Transport};
use crate::error::{KojacError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// 模拟文件传输
///
/// 每个操作读取 `<path>/<key>.json` 作为它的响应条目；
/// 任何一个文件缺失或无法解析都会使整次发送失败
#[derive(Debug, Clone)]
pub struct MockFileTransport {
    path: PathBuf,
}

impl MockFileTransport {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    // 键只能是单个文件名，不能带路径分隔符或 `..`
    fn file_for(&self, key: &str) -> Result<PathBuf> {
        if key.contains(['/', '\\']) || key.contains("..") {
            return Err(KojacError::TransportError(format!(
                "key '{}' cannot be served from a mock file",
                key
            )));
        }
        Ok(self.path.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl Transport for MockFileTransport {
    #[instrument(skip(self, envelope), level = "debug", fields(ops = envelope.ops.len()))]
    async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope> {
        let mut ops = Vec::with_capacity(envelope.ops.len());
        for op in &envelope.ops {
            let file = self.file_for(&op.key)?;
            let text = tokio::fs::read_to_string(&file).await.map_err(|e| {
                warn!("mock file unreadable: {}", file.display());
                KojacError::TransportError(format!("{}: {}", file.display(), e))
            })?;
            let entry: Value = serde_json::from_str(&text)?;
            debug!("mock file served: key={}", op.key);
            ops.push(entry);
        }
        Ok(ResponseEnvelope { ops })
    }
}
