//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存存储接口与缓存协调器。

pub mod coordinator;

pub use coordinator::CacheCoordinator;

use crate::error::{KojacError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// 缓存存储特征
///
/// 进程级共享的 键 → 值 映射。批量窗口钩子只是优化提示，
/// 正确性不依赖它们
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 存储名称，用于日志
    fn name(&self) -> &str;

    /// 获取缓存值
    ///
    /// # 参数
    ///
    /// * `key` - 缓存键
    ///
    /// # 返回值
    ///
    /// 返回缓存值，如果不存在则返回None
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// 设置缓存值
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// 删除缓存项
    async fn delete(&self, key: &str) -> Result<()>;

    /// 键是否存在
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// 开始批量写入窗口
    async fn begin_batch(&self) -> Result<()> {
        Ok(())
    }

    /// 结束批量写入窗口
    async fn end_batch(&self) -> Result<()> {
        Ok(())
    }

    /// 清空缓存
    async fn clear(&self) -> Result<()> {
        Err(KojacError::NotSupported(format!("clear on {}", self.name())))
    }
}
