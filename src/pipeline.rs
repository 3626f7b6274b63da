//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块实现了通用的异步顺序流水线。
//!
//! 阶段（Stage）保存在一个有序序列中，配合一个游标按顺序逐个执行。
//! 每次派发阶段前都会让出调度（`yield_now`），因此阶段 N+1 永远不会嵌套在
//! 阶段 N 的调用栈中。阶段可以通过 [`StageControl::suspend`] 挂起流水线，
//! 在自己的异步完成回调里用 [`Resumer`] 继续或失败。

use crate::error::PipelineError;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

/// 流水线上下文
///
/// 所有阶段共享同一个上下文；上下文上的错误会短路剩余阶段
pub trait PipelineContext: Send + 'static {
    /// 当前错误
    fn error(&self) -> Option<&PipelineError>;

    /// 设置错误
    fn set_error(&mut self, error: PipelineError);

    /// 上下文自带的状态查询，默认没有
    fn status(&self) -> Option<&StatusCell> {
        None
    }

    /// 由 `execute` 在上下文没有状态查询时附加
    fn attach_status(&mut self, _status: StatusCell) {}
}

/// 结算状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementState {
    Pending,
    Resolved,
    Rejected,
}

/// 可共享的结算状态查询
///
/// 克隆后指向同一个状态
#[derive(Debug, Clone, Default)]
pub struct StatusCell(Arc<AtomicU8>);

impl StatusCell {
    const PENDING: u8 = 0;
    const RESOLVED: u8 = 1;
    const REJECTED: u8 = 2;

    fn set(&self, state: SettlementState) {
        let raw = match state {
            SettlementState::Pending => Self::PENDING,
            SettlementState::Resolved => Self::RESOLVED,
            SettlementState::Rejected => Self::REJECTED,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    /// 当前状态
    pub fn state(&self) -> SettlementState {
        match self.0.load(Ordering::SeqCst) {
            Self::RESOLVED => SettlementState::Resolved,
            Self::REJECTED => SettlementState::Rejected,
            _ => SettlementState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == SettlementState::Pending
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == SettlementState::Resolved
    }

    pub fn is_rejected(&self) -> bool {
        self.state() == SettlementState::Rejected
    }
}

/// 流水线阶段
///
/// 阶段本身就是它的接收者（receiver），需要的状态都保存在实现者里
pub trait Stage<C>: Send + Sync + 'static {
    /// 阶段名称，用于日志
    fn name(&self) -> &str;

    /// 执行阶段
    ///
    /// 返回 `Err` 或 panic 都会使流水线立即进入 Rejected
    fn run(&self, context: &mut C, control: &mut StageControl<C>) -> Result<(), PipelineError>;
}

/// 由闭包构成的阶段
pub struct FnStage<F> {
    name: String,
    f: F,
}

/// 用闭包创建阶段
pub fn stage_fn<C, F>(name: impl Into<String>, f: F) -> FnStage<F>
where
    F: Fn(&mut C, &mut StageControl<C>) -> Result<(), PipelineError> + Send + Sync + 'static,
{
    FnStage {
        name: name.into(),
        f,
    }
}

impl<C, F> Stage<C> for FnStage<F>
where
    F: Fn(&mut C, &mut StageControl<C>) -> Result<(), PipelineError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, context: &mut C, control: &mut StageControl<C>) -> Result<(), PipelineError> {
        (self.f)(context, control)
    }
}

struct StageEntry<C> {
    stage: Arc<dyn Stage<C>>,
    param: Option<Value>,
}

impl<C> Clone for StageEntry<C> {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage.clone(),
            param: self.param.clone(),
        }
    }
}

/// 阶段序列 + 游标
struct StageQueue<C> {
    entries: Vec<StageEntry<C>>,
    cursor: usize,
    running: bool,
}

impl<C> StageQueue<C> {
    fn add(&mut self, entry: StageEntry<C>) {
        self.entries.push(entry);
    }

    // 执行期间，最前面即待执行部分的最前面；已执行的阶段不会被重新执行
    fn push(&mut self, entry: StageEntry<C>) {
        if self.running {
            self.entries.insert(self.cursor, entry);
        } else {
            self.entries.insert(0, entry);
        }
    }

    fn insert_next(&mut self, entry: StageEntry<C>) {
        if self.running {
            self.entries.insert(self.cursor, entry);
        } else {
            self.push(entry);
        }
    }

    fn next_entry(&mut self) -> Option<StageEntry<C>> {
        let entry = self.entries.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(entry)
    }
}

// execute 的 future 在挂起时被丢弃也要清除运行标记
struct RunningGuard<'a, C> {
    queue: &'a Mutex<StageQueue<C>>,
}

impl<C> Drop for RunningGuard<'_, C> {
    fn drop(&mut self) {
        self.queue.lock().running = false;
    }
}

enum Resume {
    Continue,
    Fail(PipelineError),
}

type ContextSlot<C> = Arc<Mutex<Option<C>>>;

/// 异步顺序流水线
///
/// 克隆得到的是同一条流水线的句柄
pub struct Pipeline<C> {
    queue: Arc<Mutex<StageQueue<C>>>,
}

impl<C> Clone for Pipeline<C> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<C: PipelineContext> Default for Pipeline<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: PipelineContext> Pipeline<C> {
    /// 创建空流水线
    pub fn new() -> Self {
        Self {
            queue: Arc::new(Mutex::new(StageQueue {
                entries: Vec::new(),
                cursor: 0,
                running: false,
            })),
        }
    }

    /// 追加到队尾
    pub fn add<S: Stage<C>>(&self, stage: S, param: Option<Value>) {
        self.queue.lock().add(entry(stage, param));
    }

    /// 插入到最前面
    ///
    /// 执行期间等同于 [`Pipeline::insert_next`]
    pub fn push<S: Stage<C>>(&self, stage: S, param: Option<Value>) {
        self.queue.lock().push(entry(stage, param));
    }

    /// 插入到游标处，紧接当前阶段之后执行；未开始执行时等同于 [`Pipeline::push`]
    pub fn insert_next<S: Stage<C>>(&self, stage: S, param: Option<Value>) {
        self.queue.lock().insert_next(entry(stage, param));
    }

    /// 阶段数量
    pub fn len(&self) -> usize {
        self.queue.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 阶段名称（按执行顺序）
    pub fn stage_names(&self) -> Vec<String> {
        self.queue
            .lock()
            .entries
            .iter()
            .map(|e| e.stage.name().to_string())
            .collect()
    }

    /// 移除所有阶段
    pub fn clear(&self) {
        let mut queue = self.queue.lock();
        queue.entries.clear();
        queue.cursor = 0;
    }

    /// 以 `context` 执行流水线
    ///
    /// 返回的 future 在流水线结算时完成，每次调用最多结算一次。
    /// 如果上下文没有状态查询，会附加一个 [`StatusCell`]。
    #[instrument(skip(self, context), level = "debug", fields(stages = self.len()))]
    pub async fn execute(&self, mut context: C) -> Settlement<C> {
        let status = match context.status() {
            Some(existing) => existing.clone(),
            None => {
                let cell = StatusCell::default();
                context.attach_status(cell.clone());
                cell
            }
        };

        {
            let mut queue = self.queue.lock();
            if queue.running {
                warn!("pipeline execute called while already executing");
                context.set_error(PipelineError::AlreadyRunning);
                status.set(SettlementState::Rejected);
                return Settlement::Rejected(context);
            }
            queue.running = true;
            queue.cursor = 0;
        }
        let guard = RunningGuard { queue: &self.queue };
        status.set(SettlementState::Pending);

        let slot: ContextSlot<C> = Arc::new(Mutex::new(Some(context)));
        let state = self.drive(&slot).await;

        drop(guard);
        status.set(state);
        debug!(?state, "pipeline settled");

        let context = slot.lock().take();
        let Some(context) = context else {
            unreachable!("pipeline context is only taken on settlement")
        };
        match state {
            SettlementState::Rejected => Settlement::Rejected(context),
            _ => Settlement::Resolved(context),
        }
    }

    async fn drive(&self, slot: &ContextSlot<C>) -> SettlementState {
        loop {
            if has_error(slot) {
                return SettlementState::Rejected;
            }
            let next = self.queue.lock().next_entry();
            let Some(entry) = next else {
                return SettlementState::Resolved;
            };

            tokio::task::yield_now().await;

            let mut control = StageControl {
                queue: self.queue.clone(),
                slot: slot.clone(),
                param: entry.param.clone(),
                awaiting: None,
            };
            debug!(stage = entry.stage.name(), "dispatching stage");

            let outcome = {
                let mut guard = slot.lock();
                let Some(context) = guard.as_mut() else {
                    return SettlementState::Rejected;
                };
                panic::catch_unwind(AssertUnwindSafe(|| entry.stage.run(context, &mut control)))
            };

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error),
                Err(payload) => Some(PipelineError::Panicked(panic_message(payload.as_ref()))),
            };
            if let Some(error) = failure {
                warn!(stage = entry.stage.name(), %error, "stage failed");
                store_error(slot, error);
                return SettlementState::Rejected;
            }

            if let Some(signal) = control.awaiting.take() {
                debug!(stage = entry.stage.name(), "stage suspended, awaiting resume");
                match signal.await {
                    Ok(Resume::Continue) => {}
                    Ok(Resume::Fail(error)) => {
                        warn!(stage = entry.stage.name(), %error, "suspended stage failed");
                        store_error(slot, error);
                        return SettlementState::Rejected;
                    }
                    Err(_) => {
                        store_error(slot, PipelineError::Abandoned);
                        return SettlementState::Rejected;
                    }
                }
            }
        }
    }
}

fn entry<C, S: Stage<C>>(stage: S, param: Option<Value>) -> StageEntry<C> {
    StageEntry {
        stage: Arc::new(stage),
        param,
    }
}

fn has_error<C: PipelineContext>(slot: &ContextSlot<C>) -> bool {
    slot.lock().as_ref().is_some_and(|c| c.error().is_some())
}

fn store_error<C: PipelineContext>(slot: &ContextSlot<C>, error: PipelineError) {
    if let Some(context) = slot.lock().as_mut() {
        context.set_error(error);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 阶段执行期间可用的控制句柄
pub struct StageControl<C> {
    queue: Arc<Mutex<StageQueue<C>>>,
    slot: ContextSlot<C>,
    param: Option<Value>,
    awaiting: Option<oneshot::Receiver<Resume>>,
}

impl<C: PipelineContext> StageControl<C> {
    /// 注册阶段时附带的参数
    pub fn parameter(&self) -> Option<&Value> {
        self.param.as_ref()
    }

    /// 挂起流水线，直到返回的 [`Resumer`] 被调用
    ///
    /// 多次调用时只有最后一个 Resumer 有效
    pub fn suspend(&mut self) -> Resumer<C> {
        let (tx, rx) = oneshot::channel();
        self.awaiting = Some(rx);
        Resumer {
            slot: self.slot.clone(),
            signal: tx,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.awaiting.is_some()
    }

    pub fn add<S: Stage<C>>(&self, stage: S, param: Option<Value>) {
        self.queue.lock().add(entry(stage, param));
    }

    pub fn push<S: Stage<C>>(&self, stage: S, param: Option<Value>) {
        self.queue.lock().push(entry(stage, param));
    }

    pub fn insert_next<S: Stage<C>>(&self, stage: S, param: Option<Value>) {
        self.queue.lock().insert_next(entry(stage, param));
    }
}

/// 挂起阶段的继续/失败句柄
///
/// 消费式 API 保证每次挂起最多结算一次；未调用即被丢弃时流水线以
/// [`PipelineError::Abandoned`] 拒绝
pub struct Resumer<C> {
    slot: ContextSlot<C>,
    signal: oneshot::Sender<Resume>,
}

impl<C> Resumer<C> {
    /// 访问共享上下文
    ///
    /// 不能在阶段的 `run` 内同步调用（此时上下文正被借用）
    pub fn with_context<R>(&self, f: impl FnOnce(&mut C) -> R) -> Option<R> {
        self.slot.lock().as_mut().map(f)
    }

    /// 继续执行后续阶段
    pub fn resume(self) {
        let _ = self.signal.send(Resume::Continue);
    }

    /// 把错误写入上下文并直接进入 Rejected
    pub fn fail(self, error: PipelineError) {
        let _ = self.signal.send(Resume::Fail(error));
    }
}

/// 流水线结算结果
#[derive(Debug)]
pub enum Settlement<C> {
    Resolved(C),
    Rejected(C),
}

impl<C> Settlement<C> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Settlement::Resolved(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Settlement::Rejected(_))
    }

    pub fn context(&self) -> &C {
        match self {
            Settlement::Resolved(c) | Settlement::Rejected(c) => c,
        }
    }

    pub fn into_context(self) -> C {
        match self {
            Settlement::Resolved(c) | Settlement::Rejected(c) => c,
        }
    }

    pub fn into_result(self) -> Result<C, C> {
        match self {
            Settlement::Resolved(c) => Ok(c),
            Settlement::Rejected(c) => Err(c),
        }
    }
}
