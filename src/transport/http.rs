//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了基于 HTTP POST 的远程传输。

use super::{RequestEnvelope, ResponseEnvelope, Transport};
use crate::error::{KojacError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// HTTP 传输
///
/// 把信封以 JSON POST 到服务端地址
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    server_path: String,
}

impl HttpTransport {
    /// 创建 HTTP 传输
    ///
    /// # 参数
    ///
    /// * `server_path` - 服务端地址
    /// * `timeout_ms` - 单次往返超时（毫秒）
    pub fn new(server_path: &str, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| {
                KojacError::TransportError(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            client,
            server_path: server_path.to_string(),
        })
    }

    pub fn server_path(&self) -> &str {
        &self.server_path
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, envelope), level = "debug", fields(ops = envelope.ops.len()))]
    async fn send(&self, envelope: RequestEnvelope) -> Result<ResponseEnvelope> {
        debug!("POST {} with {} ops", self.server_path, envelope.ops.len());
        let response = self
            .client
            .post(&self.server_path)
            .json(&envelope)
            .send()
            .await?
            .error_for_status()?;
        let body: ResponseEnvelope = response.json().await?;
        debug!("response received: ops={}", body.ops.len());
        Ok(body)
    }
}
