//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求及其操作的数据模型。

pub mod builder;
pub mod operation;
pub mod results;

pub use builder::{interpret_keys, CallOptions, KeyValues, RequestBuilder};
pub use operation::{Operation, OperationOptions, Verb};
pub use results::ResultMap;

use crate::error::PipelineError;
use crate::pipeline::{PipelineContext, StatusCell};
use serde_json::Value;
use uuid::Uuid;

/// 一次请求：按插入顺序排列的操作集合
///
/// 流水线结算后由 [`Request::finalize`] 汇总 `results`、`result` 与 `error`
#[derive(Debug)]
pub struct Request {
    id: Uuid,
    ops: Vec<Operation>,
    results: ResultMap,
    result: Option<Value>,
    error: Option<PipelineError>,
    status: Option<StatusCell>,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            ops: Vec::new(),
            results: ResultMap::new(),
            result: None,
            error: None,
            status: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn ops_mut(&mut self) -> &mut [Operation] {
        &mut self.ops
    }

    pub(crate) fn push_operation(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// 第一个操作
    pub fn op(&self) -> Option<&Operation> {
        self.ops.first()
    }

    /// 所有操作结果的合并，后面的操作覆盖同名键
    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    /// 第一个操作的派生结果
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.status.as_ref().map_or(true, StatusCell::is_pending)
    }

    pub fn is_resolved(&self) -> bool {
        self.status.as_ref().is_some_and(StatusCell::is_resolved)
    }

    pub fn is_rejected(&self) -> bool {
        self.status.as_ref().is_some_and(StatusCell::is_rejected)
    }

    /// 尚未执行的操作下标，按插入顺序
    pub fn unperformed(&self) -> Vec<usize> {
        self.ops
            .iter()
            .enumerate()
            .filter(|(_, op)| !op.performed())
            .map(|(i, _)| i)
            .collect()
    }

    /// 汇总操作结果
    ///
    /// 请求错误取按顺序遇到的第一个操作错误（已有请求级错误时保留）
    pub fn finalize(&mut self) {
        let mut results = ResultMap::new();
        for op in &mut self.ops {
            if self.error.is_none() {
                if let Some(error) = op.error() {
                    self.error = Some(PipelineError::Operation(error.clone()));
                }
            }
            results.extend(op.results());
            op.finalize_result();
        }
        self.results = results;
        self.result = self.ops.first().and_then(|op| op.result().cloned());
    }
}

impl PipelineContext for Request {
    fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    fn set_error(&mut self, error: PipelineError) {
        self.error = Some(error);
    }

    fn status(&self) -> Option<&StatusCell> {
        self.status.as_ref()
    }

    fn attach_status(&mut self, status: StatusCell) {
        self.status = Some(status);
    }
}
