//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 统一工具模块
//!
//! 提供库、命令行与测试共用的工具函数，包括：
//! - 日志设置工具
//! - 缓存键拼接工具
//! - 按 id 批量读取缓存

use crate::cache::CacheStore;
use crate::error::Result;
use serde_json::Value;
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub use crate::request::interpret_keys;

/// 缓存键各部分之间的分隔符
pub const KEY_SEPARATOR: &str = "__";

static INIT: Once = Once::new();

/// 安装全局日志订阅者
///
/// 读取 `RUST_LOG`，未设置时为 `info`；重复调用无副作用
pub fn setup_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(filter)
            .try_init()
            .ok();
    });
}

/// 用 `__` 拼接缓存键
///
/// ```
/// assert_eq!(kojac::utils::key_join(&["products", "12"]), "products__12");
/// ```
pub fn key_join<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

/// 按 `prefix__id` 从缓存中读取每个 id 的值，顺序与 `ids` 一致
pub async fn collect_ids<I: ToString>(
    prefix: &str,
    ids: &[I],
    cache: &dyn CacheStore,
) -> Result<Vec<Option<Value>>> {
    let mut values = Vec::with_capacity(ids.len());
    for id in ids {
        let key = key_join(&[prefix.to_string(), id.to_string()]);
        values.push(cache.get(&key).await?);
    }
    Ok(values)
}
