//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 流水线集成测试

use kojac::pipeline::{stage_fn, Pipeline, PipelineContext, StageControl};
use kojac::{PipelineError, Request};
use serde_json::json;
use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;

#[derive(Debug, Default)]
struct Journal {
    entries: Vec<String>,
    error: Option<PipelineError>,
}

impl PipelineContext for Journal {
    fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    fn set_error(&mut self, error: PipelineError) {
        self.error = Some(error);
    }
}

fn note(name: &'static str) -> impl kojac::Stage<Journal> {
    stage_fn(
        name,
        move |journal: &mut Journal, _control: &mut StageControl<Journal>| {
            journal.entries.push(name.to_string());
            Ok(())
        },
    )
}

/// 测试空流水线立即以原上下文完成
#[tokio::test]
async fn test_empty_pipeline_resolves_with_context() {
    common::setup_logging();
    let pipeline = Pipeline::new();
    let settlement = pipeline
        .execute(Journal {
            entries: vec!["untouched".to_string()],
            error: None,
        })
        .await;
    assert!(settlement.is_resolved());
    assert_eq!(settlement.context().entries, vec!["untouched"]);
}

/// 测试错误短路剩余阶段
#[tokio::test]
async fn test_error_short_circuits_remaining_stages() {
    let pipeline = Pipeline::new();
    pipeline.add(note("first"), None);
    pipeline.add(
        stage_fn(
            "breaks",
            |journal: &mut Journal, _control: &mut StageControl<Journal>| {
                journal.set_error(PipelineError::Stage("broken".to_string()));
                Ok(())
            },
        ),
        None,
    );
    pipeline.add(note("never"), None);

    let journal = pipeline
        .execute(Journal::default())
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(journal.entries, vec!["first"]);
    assert_eq!(
        journal.error,
        Some(PipelineError::Stage("broken".to_string()))
    );
}

/// 测试 push 在执行前插入到最前，insert_next 在执行中插到当前阶段之后
#[tokio::test]
async fn test_insertion_policies() {
    let pipeline = Pipeline::new();
    pipeline.add(note("a"), None);
    pipeline.add(
        stage_fn(
            "b",
            |journal: &mut Journal, control: &mut StageControl<Journal>| {
                journal.entries.push("b".to_string());
                control.insert_next(note("after-b"), None);
                Ok(())
            },
        ),
        None,
    );
    pipeline.add(note("c"), None);
    pipeline.push(note("front"), None);

    let journal = pipeline.execute(Journal::default()).await.into_context();
    assert_eq!(journal.entries, vec!["front", "a", "b", "after-b", "c"]);
}

/// 测试执行中 push 的阶段排在所有待执行阶段之前，已执行的阶段不会重跑
#[tokio::test]
async fn test_push_while_running_goes_ahead_of_pending_stages() {
    let pipeline = Pipeline::new();
    pipeline.add(
        stage_fn(
            "a",
            |journal: &mut Journal, control: &mut StageControl<Journal>| {
                journal.entries.push("a".to_string());
                control.push(note("pushed"), None);
                Ok(())
            },
        ),
        None,
    );
    pipeline.add(note("b"), None);
    pipeline.add(note("c"), None);

    let journal = pipeline.execute(Journal::default()).await.into_context();
    assert_eq!(journal.entries, vec!["a", "pushed", "b", "c"]);
    assert_eq!(pipeline.stage_names(), vec!["a", "pushed", "b", "c"]);
}

/// 测试挂起后在异步任务中继续
#[tokio::test]
async fn test_suspend_and_resume_from_task() {
    let pipeline = Pipeline::new();
    pipeline.add(
        stage_fn(
            "waits",
            |journal: &mut Journal, control: &mut StageControl<Journal>| {
                journal.entries.push("suspended".to_string());
                let resumer = control.suspend();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    resumer.with_context(|j| j.entries.push("resumed".to_string()));
                    resumer.resume();
                });
                Ok(())
            },
        ),
        None,
    );
    pipeline.add(note("after"), None);

    let settlement = pipeline.execute(Journal::default()).await;
    assert!(settlement.is_resolved());
    assert_eq!(
        settlement.context().entries,
        vec!["suspended", "resumed", "after"]
    );
}

/// 测试失败句柄直接拒绝
#[tokio::test]
async fn test_fail_from_task_rejects() {
    let pipeline = Pipeline::new();
    pipeline.add(
        stage_fn(
            "fails",
            |_journal: &mut Journal, control: &mut StageControl<Journal>| {
                let resumer = control.suspend();
                tokio::spawn(async move {
                    resumer.fail(PipelineError::Stage("remote down".to_string()));
                });
                Ok(())
            },
        ),
        None,
    );
    pipeline.add(note("never"), None);

    let settlement = pipeline.execute(Journal::default()).await;
    assert!(settlement.is_rejected());
    assert!(settlement.context().entries.is_empty());
}

/// 测试阶段 panic 被转换为拒绝
#[tokio::test]
async fn test_panicking_stage_rejects() {
    let pipeline = Pipeline::new();
    pipeline.add(
        stage_fn(
            "panics",
            |_journal: &mut Journal, _control: &mut StageControl<Journal>| {
                panic!("stage exploded");
            },
        ),
        None,
    );
    let journal = pipeline
        .execute(Journal::default())
        .await
        .into_result()
        .unwrap_err();
    assert_eq!(
        journal.error,
        Some(PipelineError::Panicked("stage exploded".to_string()))
    );
}

/// 测试大量同步阶段不会造成栈溢出
#[tokio::test]
async fn test_many_synchronous_stages() {
    let pipeline = Pipeline::new();
    for _ in 0..10_000 {
        pipeline.add(
            stage_fn(
                "tick",
                |journal: &mut Journal, _control: &mut StageControl<Journal>| {
                    journal.entries.push(String::new());
                    Ok(())
                },
            ),
            None,
        );
    }
    let journal = pipeline.execute(Journal::default()).await.into_context();
    assert_eq!(journal.entries.len(), 10_000);
}

/// 测试阶段参数
#[tokio::test]
async fn test_stage_parameter() {
    let pipeline = Pipeline::new();
    pipeline.add(
        stage_fn(
            "param",
            |journal: &mut Journal, control: &mut StageControl<Journal>| {
                let label = control
                    .parameter()
                    .and_then(|p| p.get("label"))
                    .and_then(|l| l.as_str())
                    .unwrap_or("none")
                    .to_string();
                journal.entries.push(label);
                Ok(())
            },
        ),
        Some(json!({"label": "configured"})),
    );
    let journal = pipeline.execute(Journal::default()).await.into_context();
    assert_eq!(journal.entries, vec!["configured"]);
}

/// 测试状态查询附加到请求上
#[tokio::test]
async fn test_status_query_attached_to_request() {
    let request = Request::new();
    assert!(request.is_pending());

    let pipeline: Pipeline<Request> = Pipeline::new();
    let request = pipeline.execute(request).await.into_context();
    assert!(request.is_resolved());
    assert!(!request.is_rejected());
    assert!(!request.is_pending());
}
