//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了客户端核心：装配传输、对象工厂与缓存协调器，并提供各动词的入口。

use crate::backend::{self, MemoryCache};
use crate::cache::{CacheCoordinator, CacheStore};
use crate::config::{Config, DEFAULT_FORMAT};
use crate::error::{KojacError, Result};
use crate::factory::ObjectFactory;
use crate::metrics::GLOBAL_METRICS;
use crate::pipeline::Pipeline;
use crate::request::{CallOptions, KeyValues, Request, RequestBuilder};
use crate::stages::{CacheStoreStage, RemoteFetchStage, ShapeStage};
use crate::transport::{self, Transport};
use crate::utils;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

struct KojacInner {
    transport: Arc<dyn Transport>,
    factory: Option<Arc<ObjectFactory>>,
    coordinator: Arc<CacheCoordinator>,
    format: String,
}

/// 客户端核心
///
/// 克隆开销很小，所有克隆共享同一个缓存与依赖键表
#[derive(Clone)]
pub struct Kojac {
    inner: Arc<KojacInner>,
}

/// [`Kojac`] 构建器
pub struct KojacBuilder {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn CacheStore>>,
    factory: Option<ObjectFactory>,
    format: String,
}

impl KojacBuilder {
    /// 缓存后端，默认 [`MemoryCache`]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// 对象工厂；不设置时不注册塑造阶段
    pub fn factory(mut self, factory: ObjectFactory) -> Self {
        self.factory = Some(factory);
        self
    }

    /// 信封协议标识
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn build(self) -> Kojac {
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::new()) as Arc<dyn CacheStore>);
        Kojac {
            inner: Arc::new(KojacInner {
                transport: self.transport,
                factory: self.factory.map(Arc::new),
                coordinator: Arc::new(CacheCoordinator::new(cache)),
                format: self.format,
            }),
        }
    }
}

impl Kojac {
    pub fn builder(transport: Arc<dyn Transport>) -> KojacBuilder {
        KojacBuilder {
            transport,
            cache: None,
            factory: None,
            format: DEFAULT_FORMAT.to_string(),
        }
    }

    /// 使用默认内存缓存创建
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::builder(transport).build()
    }

    /// 按配置创建传输层与缓存后端
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().map_err(KojacError::ConfigError)?;
        let transport = transport::from_config(&config.remote)?;
        let cache = backend::from_config(&config.cache);
        info!(
            "kojac configured: remote={}, cache={}",
            config
                .remote
                .mock
                .as_ref()
                .map(|m| m.path.display().to_string())
                .unwrap_or_else(|| config.remote.server_path.clone()),
            cache.name()
        );
        Ok(Self::builder(transport)
            .cache(cache)
            .format(config.remote.format.clone())
            .build())
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        self.inner.coordinator.cache()
    }

    pub fn coordinator(&self) -> &Arc<CacheCoordinator> {
        &self.inner.coordinator
    }

    pub fn factory(&self) -> Option<&Arc<ObjectFactory>> {
        self.inner.factory.as_ref()
    }

    pub fn format(&self) -> &str {
        &self.inner.format
    }

    /// 某个键的依赖键
    pub fn dependent_keys(&self, key: &str) -> Option<Vec<String>> {
        self.inner.coordinator.dependent_keys(key)
    }

    /// 从缓存读取 `prefix__id` 列表
    pub async fn collect_ids<I: ToString>(
        &self,
        prefix: &str,
        ids: &[I],
    ) -> Result<Vec<Option<Value>>> {
        utils::collect_ids(prefix, ids, self.cache().as_ref()).await
    }

    pub fn new_request(&self) -> RequestBuilder {
        RequestBuilder::new(self.clone())
    }

    pub fn create(&self, key_values: impl Into<KeyValues>) -> RequestBuilder {
        self.new_request().create(key_values)
    }

    pub fn read(&self, keys: impl Into<KeyValues>) -> RequestBuilder {
        self.new_request().read(keys)
    }

    pub fn cache_read(&self, keys: impl Into<KeyValues>) -> RequestBuilder {
        self.new_request().cache_read(keys)
    }

    pub fn update(&self, key_values: impl Into<KeyValues>) -> RequestBuilder {
        self.new_request().update(key_values)
    }

    pub fn destroy(&self, keys: impl Into<KeyValues>) -> RequestBuilder {
        self.new_request().destroy(keys)
    }

    pub fn execute(&self, key_values: impl Into<KeyValues>) -> RequestBuilder {
        self.new_request().execute(key_values)
    }

    pub async fn create_request(
        &self,
        key_values: impl Into<KeyValues>,
        options: CallOptions,
    ) -> Result<Request> {
        self.new_request()
            .create_with(key_values, options)
            .request()
            .await
    }

    pub async fn read_request(
        &self,
        keys: impl Into<KeyValues>,
        options: CallOptions,
    ) -> Result<Request> {
        self.new_request().read_with(keys, options).request().await
    }

    pub async fn cache_read_request(
        &self,
        keys: impl Into<KeyValues>,
        options: CallOptions,
    ) -> Result<Request> {
        self.new_request()
            .cache_read_with(keys, options)
            .request()
            .await
    }

    pub async fn update_request(
        &self,
        key_values: impl Into<KeyValues>,
        options: CallOptions,
    ) -> Result<Request> {
        self.new_request()
            .update_with(key_values, options)
            .request()
            .await
    }

    pub async fn destroy_request(
        &self,
        keys: impl Into<KeyValues>,
        options: CallOptions,
    ) -> Result<Request> {
        self.new_request()
            .destroy_with(keys, options)
            .request()
            .await
    }

    pub async fn execute_request(
        &self,
        key_values: impl Into<KeyValues>,
        options: CallOptions,
    ) -> Result<Request> {
        self.new_request()
            .execute_with(key_values, options)
            .request()
            .await
    }

    /// 执行一个请求
    ///
    /// 先用缓存预解析，再依次运行远程获取、对象塑造（如已配置）与缓存写入阶段；
    /// 结算后汇总结果并更新依赖键表
    #[instrument(skip(self, request, pipeline), level = "debug", fields(request_id = %request.id(), ops = request.ops().len()))]
    pub(crate) async fn perform_request(
        &self,
        mut request: Request,
        pipeline: Pipeline<Request>,
    ) -> Result<Request> {
        let coordinator = &self.inner.coordinator;
        coordinator.pre_resolve(&mut request).await?;

        pipeline.add(
            RemoteFetchStage::new(self.inner.transport.clone(), self.inner.format.clone()),
            None,
        );
        if let Some(factory) = &self.inner.factory {
            pipeline.add(ShapeStage::new(factory.clone()), None);
        }
        pipeline.add(CacheStoreStage::new(coordinator.clone()), None);

        let settlement = pipeline.execute(request).await;
        let rejected = settlement.is_rejected();
        let mut request = settlement.into_context();
        request.finalize();
        coordinator.record_dependents(&request).await;

        if rejected {
            GLOBAL_METRICS.record("request", "rejected");
            warn!(
                "request rejected: {}",
                request
                    .error()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            );
            return Err(KojacError::Rejected(Box::new(request)));
        }
        if request.error().is_some() {
            GLOBAL_METRICS.record("request", "failed_ops");
        } else {
            GLOBAL_METRICS.record("request", "resolved");
        }
        Ok(request)
    }
}
