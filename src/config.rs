//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了客户端的配置结构和解析逻辑。

use crate::error::{KojacError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_VERSION: u32 = 1;
pub const CONFIG_VERSION_FIELD: &str = "config_version";

/// 默认的信封协议标识
pub const DEFAULT_FORMAT: &str = "KOJAC-1.0";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// 远程服务配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RemoteConfig {
    /// 服务端地址
    pub server_path: String,
    /// 信封协议标识
    pub format: String,
    /// 请求超时（毫秒）
    pub timeout_ms: u64,
    /// 以文件代替 HTTP 提供响应
    pub mock: Option<MockConfig>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            server_path: String::new(),
            format: DEFAULT_FORMAT.to_string(),
            timeout_ms: 30000,
            mock: None,
        }
    }
}

/// 模拟文件配置
#[derive(Deserialize, Clone, Debug)]
pub struct MockConfig {
    /// 存放 `<key>.json` 的目录
    pub path: PathBuf,
}

/// 缓存后端类型
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// 进程内无界映射
    #[default]
    Memory,
    /// Moka 有界缓存
    Moka,
}

/// 缓存配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// 最大条目数，仅 moka
    pub max_capacity: u64,
    /// 存活时间（秒），0 表示不过期，仅 moka
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            max_capacity: 10000,
            ttl_secs: 0,
        }
    }
}

impl Config {
    /// 从 TOML 文本解析并验证配置
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| KojacError::ConfigError(e.to_string()))?;
        config.validate().map_err(KojacError::ConfigError)?;
        Ok(config)
    }

    /// 从文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.remote.mock.is_none() && self.remote.server_path.trim().is_empty() {
            return Err("remote.server_path cannot be empty unless remote.mock is set".to_string());
        }

        if self.remote.format.trim().is_empty() {
            return Err("remote.format cannot be empty".to_string());
        }

        if !(100..=600_000).contains(&self.remote.timeout_ms) {
            return Err("remote.timeout_ms must be between 100 and 600000".to_string());
        }

        if let Some(mock) = &self.remote.mock {
            if mock.path.as_os_str().is_empty() {
                return Err("remote.mock.path cannot be empty".to_string());
            }
        }

        if self.cache.backend == CacheBackendKind::Moka && self.cache.max_capacity == 0 {
            return Err("cache.max_capacity must be greater than zero for moka".to_string());
        }

        Ok(())
    }
}
