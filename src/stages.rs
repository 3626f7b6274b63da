//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求流水线的三个固定阶段：远程获取、对象塑造与缓存写入。

use crate::cache::CacheCoordinator;
use crate::error::{OperationError, PipelineError};
use crate::factory::ObjectFactory;
use crate::metrics::GLOBAL_METRICS;
use crate::pipeline::{Stage, StageControl};
use crate::request::Request;
use crate::transport::{RequestEnvelope, Transport};
use std::sync::Arc;
use tracing::{debug, warn};

/// 远程获取阶段
///
/// 把所有未执行的操作按插入顺序打包成一个信封发送，
/// 响应条目按位置回填到对应操作
pub struct RemoteFetchStage {
    transport: Arc<dyn Transport>,
    format: String,
}

impl RemoteFetchStage {
    pub fn new(transport: Arc<dyn Transport>, format: impl Into<String>) -> Self {
        Self {
            transport,
            format: format.into(),
        }
    }
}

impl Stage<Request> for RemoteFetchStage {
    fn name(&self) -> &str {
        "remote_fetch"
    }

    fn run(
        &self,
        request: &mut Request,
        control: &mut StageControl<Request>,
    ) -> Result<(), PipelineError> {
        let indices = request.unperformed();
        if indices.is_empty() {
            debug!("remote fetch skipped: nothing to fetch");
            return Ok(());
        }

        let envelope = RequestEnvelope::for_operations(&self.format, request, &indices);
        GLOBAL_METRICS.record_remote(indices.len());
        let transport = self.transport.clone();
        let resumer = control.suspend();

        tokio::spawn(async move {
            match transport.send(envelope).await {
                Ok(response) => {
                    resumer.with_context(|request| {
                        for (position, &index) in indices.iter().enumerate() {
                            if let Some(op) = request.ops_mut().get_mut(index) {
                                op.receive_result(response.entry(position));
                                op.mark_performed(false);
                            }
                        }
                    });
                    resumer.resume();
                }
                Err(e) => {
                    warn!("remote fetch failed: {}", e);
                    GLOBAL_METRICS.record("remote", "error");
                    resumer.with_context(|request| {
                        for &index in &indices {
                            if let Some(op) = request.ops_mut().get_mut(index) {
                                op.mark_performed(false);
                            }
                        }
                    });
                    resumer.fail(OperationError::Transport(e.to_string()).into());
                }
            }
        });
        Ok(())
    }
}

/// 对象塑造阶段
pub struct ShapeStage {
    factory: Arc<ObjectFactory>,
}

impl ShapeStage {
    pub fn new(factory: Arc<ObjectFactory>) -> Self {
        Self { factory }
    }
}

impl Stage<Request> for ShapeStage {
    fn name(&self) -> &str {
        "shape"
    }

    fn run(
        &self,
        request: &mut Request,
        _control: &mut StageControl<Request>,
    ) -> Result<(), PipelineError> {
        self.factory.shape_results(request);
        Ok(())
    }
}

/// 缓存写入阶段
///
/// 未定义的结果条目从缓存中删除，而不是写入
pub struct CacheStoreStage {
    coordinator: Arc<CacheCoordinator>,
}

impl CacheStoreStage {
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        Self { coordinator }
    }
}

impl Stage<Request> for CacheStoreStage {
    fn name(&self) -> &str {
        "cache_store"
    }

    fn run(
        &self,
        request: &mut Request,
        control: &mut StageControl<Request>,
    ) -> Result<(), PipelineError> {
        let writes = CacheCoordinator::collect_writes(request);
        if writes.is_empty() {
            return Ok(());
        }

        let coordinator = self.coordinator.clone();
        let resumer = control.suspend();
        tokio::spawn(async move {
            match coordinator.store(writes).await {
                Ok(()) => resumer.resume(),
                Err(e) => {
                    warn!("cache store failed: {}", e);
                    resumer.fail(PipelineError::Stage(e.to_string()));
                }
            }
        });
        Ok(())
    }
}
