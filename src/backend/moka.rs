//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于 Moka 的有界缓存后端。

use crate::cache::CacheStore;
use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// 有界缓存后端
///
/// 超过容量时按 Moka 的策略淘汰；淘汰等同于缓存未命中
#[derive(Clone)]
pub struct MokaCache {
    cache: Cache<String, Value>,
}

impl MokaCache {
    /// 创建新的缓存后端实例
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数
    /// * `ttl_secs` - 存活时间（秒），0 表示不过期
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let mut builder = Cache::builder().max_capacity(capacity);
        if ttl_secs > 0 {
            builder = builder.time_to_live(Duration::from_secs(ttl_secs));
        }
        Self {
            cache: builder.build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl CacheStore for MokaCache {
    fn name(&self) -> &str {
        "moka"
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = self.cache.get(key).await;
        debug!("moka get: key={}, found={}", key, value.is_some());
        Ok(value)
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.remove(key).await;
        debug!("moka delete: key={} 删除完成", key);
        Ok(())
    }

    async fn end_batch(&self) -> Result<()> {
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }
}
