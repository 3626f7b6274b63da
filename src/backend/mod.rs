//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存存储的后端实现：进程内 DashMap 映射与 Moka 有界缓存。

pub mod memory;
pub mod moka;

pub use self::memory::MemoryCache;
pub use self::moka::MokaCache;

use crate::cache::CacheStore;
use crate::config::{CacheBackendKind, CacheConfig};
use std::sync::Arc;

/// 按配置创建缓存后端
pub fn from_config(config: &CacheConfig) -> Arc<dyn CacheStore> {
    match config.backend {
        CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
        CacheBackendKind::Moka => Arc::new(MokaCache::new(config.max_capacity, config.ttl_secs)),
    }
}
