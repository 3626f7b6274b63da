//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 请求构建与执行集成测试

use kojac::pipeline::{stage_fn, PipelineContext, StageControl};
use kojac::{CallOptions, KojacError, OperationError, PipelineError, Request, Verb};
use serde_json::json;

use crate::common::{kojac_with, RecordingTransport};

#[path = "../common/mod.rs"]
mod common;

/// 测试每个键生成一个操作，result_key 覆盖只作用于第一个
#[tokio::test]
async fn test_one_operation_per_key_in_order() {
    let transport = RecordingTransport::new();
    let kojac = kojac_with(&transport);

    let builder = kojac
        .new_request()
        .read_with(
            vec!["alpha", "beta", "gamma"],
            CallOptions::new().result_key("first"),
        )
        .update(json!({"delta": 4, "epsilon": 5}));

    let ops = builder.operations();
    assert_eq!(ops.len(), 5);
    let keys: Vec<_> = ops.iter().map(|op| op.key()).collect();
    assert_eq!(keys, vec!["alpha", "beta", "gamma", "delta", "epsilon"]);
    let result_keys: Vec<_> = ops.iter().map(|op| op.result_key()).collect();
    assert_eq!(result_keys, vec!["first", "beta", "gamma", "delta", "epsilon"]);
    assert_eq!(ops[3].verb(), Verb::Update);
    assert_eq!(ops[3].value(), Some(&json!(4)));
    assert!(ops[0].value().is_none());
}

/// 测试线上信封按插入顺序发送，并剥离本地选项
#[tokio::test]
async fn test_wire_envelope_shape() {
    let transport = RecordingTransport::new();
    transport.respond("users__1", json!({"results": {"users__1": {"id": 1}}}));
    transport.respond("rename", json!({"results": {"rename": true}}));
    let kojac = kojac_with(&transport);

    kojac
        .new_request()
        .read_with(
            "users__1",
            CallOptions::new()
                .prefer_cache(true)
                .cache_results(false)
                .option("include", "roles"),
        )
        .execute_with(
            ("rename", json!({"to": "bob"})),
            CallOptions::new().params(json!({"dry_run": true}).as_object().cloned().unwrap()),
        )
        .request()
        .await
        .unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        serde_json::to_value(&sent[0]).unwrap(),
        json!({
            "format": "KOJAC-1.0",
            "ops": [
                {"verb": "READ", "key": "users__1", "options": {"include": "roles"}},
                {"verb": "EXECUTE", "key": "rename", "value": {"to": "bob"}, "params": {"dry_run": true}}
            ]
        })
    );
}

/// 测试本地标志无论取值类型都不会出现在线上，并按真值生效
#[tokio::test]
async fn test_local_flags_stripped_whatever_their_type() {
    let transport = RecordingTransport::new();
    transport.respond("a", json!({"results": {"a": 1}}));
    let kojac = kojac_with(&transport);

    let request = kojac
        .read_request(
            "a",
            CallOptions::from(json!({"cacheResults": 0, "preferCache": "", "depth": 2})),
        )
        .await
        .unwrap();
    assert_eq!(request.result(), Some(&json!(1)));

    let sent = transport.sent();
    assert_eq!(
        serde_json::to_value(&sent[0]).unwrap()["ops"][0],
        json!({"verb": "READ", "key": "a", "options": {"depth": 2}})
    );
    assert!(kojac.cache().get("a").await.unwrap().is_none());
}

/// 测试类型错误的 result_key 在发送前被拒绝
#[tokio::test]
async fn test_mistyped_result_key_is_invalid_input() {
    let transport = RecordingTransport::new();
    let kojac = kojac_with(&transport);

    let err = kojac
        .read_request("a", CallOptions::from(json!({"result_key": 5})))
        .await
        .unwrap_err();
    assert!(matches!(err, KojacError::InvalidInput(msg) if msg.contains("result_key")));
    assert_eq!(transport.calls(), 0);
}

/// 测试请求结果合并：后面的操作覆盖同名键
#[tokio::test]
async fn test_results_merge_later_operation_wins() {
    let transport = RecordingTransport::new();
    transport.respond("a", json!({"results": {"a": 1, "shared": "from-a"}}));
    transport.respond("b", json!({"results": {"b": 2, "shared": "from-b"}}));
    let kojac = kojac_with(&transport);

    let request = kojac.read("a,b").request().await.unwrap();
    assert!(request.is_resolved());
    assert_eq!(request.results().get("shared"), Some(&json!("from-b")));
    assert_eq!(request.result(), Some(&json!(1)));
    assert_eq!(request.op().map(|op| op.key()), Some("a"));
    for op in request.ops() {
        assert!(op.performed());
        assert_eq!(op.from_cache(), Some(false));
    }
}

/// 测试单个操作出错时请求仍然完成，错误汇总到请求上
#[tokio::test]
async fn test_operation_error_surfaces_on_request() {
    let transport = RecordingTransport::new();
    transport.respond("ok", json!({"results": {"ok": "fine"}}));
    transport.respond("denied", json!({"error": {"code": 403}}));
    let kojac = kojac_with(&transport);

    let request = kojac.read("ok,denied,missing").request().await.unwrap();
    assert!(matches!(
        request.error(),
        Some(PipelineError::Operation(OperationError::Remote { key, detail }))
            if key == "denied" && detail == &json!({"code": 403})
    ));
    assert_eq!(request.results().get("ok"), Some(&json!("fine")));
    assert!(request.ops()[1].result().is_none());
    assert!(matches!(
        request.ops()[2].error(),
        Some(OperationError::NoResult { key }) if key == "missing"
    ));
    // 出错的操作不写入缓存
    assert!(kojac.cache().get("denied").await.unwrap().is_none());
    assert_eq!(kojac.cache().get("ok").await.unwrap(), Some(json!("fine")));
}

/// 测试传输失败时请求被拒绝，调用方仍能拿到请求
#[tokio::test]
async fn test_transport_failure_rejects_request() {
    let transport = RecordingTransport::new();
    transport.fail_with("connection reset");
    let kojac = kojac_with(&transport);

    let err = kojac.read("a").request().await.unwrap_err();
    let KojacError::Rejected(request) = err else {
        panic!("expected a rejected request");
    };
    assert!(request.is_rejected());
    assert!(matches!(
        request.error(),
        Some(PipelineError::Operation(OperationError::Transport(message)))
            if message.contains("connection reset")
    ));
    assert!(request.ops()[0].performed());
    assert_eq!(request.ops()[0].from_cache(), Some(false));
}

/// 测试非法输入在 request() 时返回，且不会发送任何内容
#[tokio::test]
async fn test_invalid_input_reported_before_running() {
    let transport = RecordingTransport::new();
    let kojac = kojac_with(&transport);

    let err = kojac.read(vec!["ok", ""]).request().await.unwrap_err();
    assert!(matches!(err, KojacError::InvalidInput(_)));

    let err = kojac.update(json!(42)).request().await.unwrap_err();
    assert!(matches!(err, KojacError::InvalidInput(_)));
    assert_eq!(transport.calls(), 0);
}

/// 测试 CREATE 未指定 result_key 时采用服务端返回的键
#[tokio::test]
async fn test_create_adopts_server_key() {
    let transport = RecordingTransport::new();
    transport.respond(
        "products",
        json!({"result_key": "products__9", "results": {"products__9": {"id": 9}}}),
    );
    let kojac = kojac_with(&transport);

    let request = kojac
        .create(("products", json!({"name": "lamp"})))
        .request()
        .await
        .unwrap();
    assert_eq!(request.ops()[0].result_key(), "products__9");
    assert_eq!(request.result(), Some(&json!({"id": 9})));
    assert_eq!(
        kojac.cache().get("products__9").await.unwrap(),
        Some(json!({"id": 9}))
    );
}

/// 测试 EXECUTE 默认不写缓存
#[tokio::test]
async fn test_execute_not_cached_by_default() {
    let transport = RecordingTransport::new();
    transport.respond("recalc", json!({"results": {"recalc": 12}}));
    let kojac = kojac_with(&transport);

    let request = kojac
        .execute_request(("recalc", json!(null)), CallOptions::new())
        .await
        .unwrap();
    assert_eq!(request.result(), Some(&json!(12)));
    assert!(kojac.cache().get("recalc").await.unwrap().is_none());
}

/// 测试自定义阶段先于核心阶段执行，且可以短路整个请求
#[tokio::test]
async fn test_custom_stage_can_veto_request() {
    let transport = RecordingTransport::new();
    let kojac = kojac_with(&transport);

    let builder = kojac.read("secret");
    builder.pipeline().add(
        stage_fn(
            "guard",
            |request: &mut Request, _control: &mut StageControl<Request>| {
                if request.ops().iter().any(|op| op.key() == "secret") {
                    request.set_error(PipelineError::Stage("forbidden key".to_string()));
                }
                Ok(())
            },
        ),
        None,
    );

    let err = builder.request().await.unwrap_err();
    assert!(matches!(err, KojacError::Rejected(_)));
    assert_eq!(transport.calls(), 0);
}
