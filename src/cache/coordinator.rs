//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了缓存协调器：缓存命中预解析、结果写入与依赖键表维护。
//!
//! 依赖键表记录某个键最近一次“新鲜”获取时随它一起返回的伴随键。
//! 缓存命中时这些伴随键一并从缓存取出；只有新鲜获取会修改该表。
//!
//! 所有写入（缓存写入、依赖键表更新）以及预解析时的读取都经过同一个写入闸门，
//! 因此并发请求不会交错写入彼此的批次。

use super::CacheStore;
use crate::error::Result;
use crate::metrics::GLOBAL_METRICS;
use crate::request::{Request, Verb};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// 一条缓存写入；`None` 表示删除
pub type CacheWrite = (String, Option<Value>);

/// 缓存协调器
pub struct CacheCoordinator {
    cache: Arc<dyn CacheStore>,
    dependents: DashMap<String, Vec<String>>,
    write_gate: Mutex<()>,
}

impl CacheCoordinator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self {
            cache,
            dependents: DashMap::new(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// 某个键的依赖键
    pub fn dependent_keys(&self, key: &str) -> Option<Vec<String>> {
        self.dependents.get(key).map(|r| r.value().clone())
    }

    /// 用缓存预解析 `prefer_cache` 的读取操作
    ///
    /// 命中的操作被标记为 performed/from_cache，主结果与其依赖键的缓存值
    /// 写入 `results`；依赖键不在缓存中时以未定义条目保留
    ///
    /// # 返回值
    ///
    /// 命中的操作数量
    #[instrument(skip(self, request), level = "debug", fields(request_id = %request.id()))]
    pub async fn pre_resolve(&self, request: &mut Request) -> Result<usize> {
        let _gate = self.write_gate.lock().await;
        let mut hits = 0;

        for op in request.ops_mut() {
            if op.verb() != Verb::Read || !op.options().prefer_cache || op.performed() {
                continue;
            }
            let key = op.result_key().to_string();
            let Some(primary) = self.cache.get(&key).await? else {
                GLOBAL_METRICS.record("prefetch", "miss");
                debug!("prefetch miss: key={}", key);
                continue;
            };

            let mut companions = Vec::new();
            if let Some(dependents) = self.dependent_keys(op.key()) {
                for dependent in dependents {
                    let value = self.cache.get(&dependent).await?;
                    if value.is_none() {
                        debug!(
                            "prefetch dependent missing: key={}, dependent={}",
                            key, dependent
                        );
                    }
                    companions.push((dependent, value));
                }
            }

            if op.resolve_from_cache(primary, companions) {
                hits += 1;
                GLOBAL_METRICS.record("prefetch", "hit");
                debug!("prefetch hit: key={}", key);
            }
        }
        Ok(hits)
    }

    /// 收集请求需要写入缓存的条目
    ///
    /// 跳过出错或 `cache_results` 为 false 的操作；每个操作先写伴随键再写主结果
    pub fn collect_writes(request: &Request) -> Vec<CacheWrite> {
        let mut writes = Vec::new();
        for op in request.ops() {
            if op.error().is_some() || !op.is_cacheable() {
                continue;
            }
            let primary = op.result_key();
            for (key, value) in op.results().iter() {
                if key != primary {
                    writes.push((key.to_string(), value.cloned()));
                }
            }
            writes.push((
                primary.to_string(),
                op.results().get(primary).cloned(),
            ));
        }
        writes
    }

    /// 写入缓存，`None` 删除对应键
    #[instrument(skip(self, writes), level = "debug", fields(count = writes.len()))]
    pub async fn store(&self, writes: Vec<CacheWrite>) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.cache.begin_batch().await?;
        GLOBAL_METRICS.record("cache", "batch");

        let mut outcome = Ok(());
        for (key, value) in writes {
            let written = match value {
                Some(value) => {
                    GLOBAL_METRICS.record("cache", "set");
                    self.cache.set(&key, value).await
                }
                None => {
                    GLOBAL_METRICS.record("cache", "delete");
                    debug!("cache tombstone: key={}", key);
                    self.cache.delete(&key).await
                }
            };
            if let Err(e) = written {
                outcome = Err(e);
                break;
            }
        }

        let ended = self.cache.end_batch().await;
        outcome.and(ended)
    }

    /// 根据新鲜获取的结果更新依赖键表
    ///
    /// 替换而不是合并；没有伴随键时删除该键的条目
    #[instrument(skip(self, request), level = "debug", fields(request_id = %request.id()))]
    pub async fn record_dependents(&self, request: &Request) {
        let _gate = self.write_gate.lock().await;
        for op in request.ops() {
            if !op.performed() || op.from_cache() != Some(false) || !op.is_cacheable() {
                continue;
            }
            let companions = op.companion_keys();
            if companions.is_empty() {
                if self.dependents.remove(op.key()).is_some() {
                    GLOBAL_METRICS.record("dependents", "remove");
                    debug!("dependent keys removed: key={}", op.key());
                }
            } else {
                debug!(
                    "dependent keys replaced: key={}, dependents={:?}",
                    op.key(),
                    companions
                );
                GLOBAL_METRICS.record("dependents", "replace");
                self.dependents.insert(op.key().to_string(), companions);
            }
        }
    }
}
