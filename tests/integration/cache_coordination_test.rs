//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 缓存预解析与依赖键表集成测试

use kojac::metrics::GLOBAL_METRICS;
use kojac::{CallOptions, Kojac, MokaCache};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;

use crate::common::{kojac_with, setup_logging, RecordingTransport};

#[path = "../common/mod.rs"]
mod common;

fn order_response() -> serde_json::Value {
    json!({
        "results": {
            "order__1": {"id": 1, "customer_id": 7},
            "customer__7": {"id": 7, "name": "ann"},
            "items__1": [{"sku": "a"}, {"sku": "b"}]
        }
    })
}

/// 测试缓存命中时带出依赖键，且不发送任何请求
#[tokio::test]
#[serial]
async fn test_cache_hit_replays_dependent_keys_without_transport() {
    let transport = RecordingTransport::new();
    transport.respond("order__1", order_response());
    let kojac = kojac_with(&transport);

    let fresh = kojac.read("order__1").request().await.unwrap();
    assert_eq!(fresh.ops()[0].from_cache(), Some(false));
    assert_eq!(
        kojac.dependent_keys("order__1"),
        Some(vec!["customer__7".to_string(), "items__1".to_string()])
    );
    assert_eq!(transport.calls(), 1);

    let hits_before = GLOBAL_METRICS.count("prefetch", "hit");
    let cached = kojac.cache_read("order__1").request().await.unwrap();
    assert_eq!(transport.calls(), 1);
    assert!(GLOBAL_METRICS.count("prefetch", "hit") > hits_before);

    let op = &cached.ops()[0];
    assert!(op.performed());
    assert_eq!(op.from_cache(), Some(true));
    assert_eq!(
        cached.results().to_json(),
        json!({
            "order__1": {"id": 1, "customer_id": 7},
            "customer__7": {"id": 7, "name": "ann"},
            "items__1": [{"sku": "a"}, {"sku": "b"}]
        })
    );
    // 缓存命中不修改依赖键表
    assert_eq!(kojac.dependent_keys("order__1").map(|d| d.len()), Some(2));
}

/// 测试依赖键在缓存中缺失时以未定义条目出现
#[tokio::test]
async fn test_missing_dependent_key_is_undefined_entry() {
    let transport = RecordingTransport::new();
    transport.respond("order__1", order_response());
    let kojac = kojac_with(&transport);

    kojac.read("order__1").request().await.unwrap();
    kojac.cache().delete("items__1").await.unwrap();

    let cached = kojac.cache_read("order__1").request().await.unwrap();
    assert_eq!(transport.calls(), 1);
    assert!(cached.results().contains_key("items__1"));
    assert!(cached.results().get("items__1").is_none());
    assert!(cached.results().to_json().get("items__1").is_none());
    // 缓存写入阶段把未定义条目当作删除，不会重新写入
    assert!(kojac.cache().get("items__1").await.unwrap().is_none());
}

/// 测试新鲜获取替换依赖键条目，没有伴随键时删除条目
#[tokio::test]
async fn test_fresh_fetch_replaces_then_removes_dependents() {
    let transport = RecordingTransport::new();
    transport.respond(
        "K",
        json!({"results": {"K": "v", "D1": "v1"}}),
    );
    let kojac = kojac_with(&transport);

    kojac.read("K").request().await.unwrap();
    assert_eq!(kojac.dependent_keys("K"), Some(vec!["D1".to_string()]));

    transport.respond("K", json!({"results": {"K": "v2", "D2": "x", "D3": "y"}}));
    kojac.read("K").request().await.unwrap();
    assert_eq!(
        kojac.dependent_keys("K"),
        Some(vec!["D2".to_string(), "D3".to_string()])
    );

    transport.respond("K", json!({"results": {"K": "v3"}}));
    kojac.read("K").request().await.unwrap();
    assert_eq!(kojac.dependent_keys("K"), None);
    assert_eq!(kojac.cache().get("K").await.unwrap(), Some(json!("v3")));
}

/// 测试未定义结果从缓存中删除对应键
#[tokio::test]
async fn test_undefined_result_deletes_cache_entry() {
    let transport = RecordingTransport::new();
    transport.respond("stale", json!({"results": {"other": 5}}));
    let kojac = kojac_with(&transport);
    kojac.cache().set("stale", json!("old")).await.unwrap();

    let request = kojac.read("stale").request().await.unwrap();
    assert!(request.ops()[0].results().contains_key("stale"));
    assert!(request.result().is_none());
    assert!(kojac.cache().get("stale").await.unwrap().is_none());
    assert_eq!(kojac.cache().get("other").await.unwrap(), Some(json!(5)));
}

/// 测试未设置 preferCache 时即使已缓存也走远程
#[tokio::test]
async fn test_prefer_cache_must_be_explicit() {
    let transport = RecordingTransport::new();
    transport.respond("a", json!({"results": {"a": "remote-a"}}));
    transport.respond("b", json!({"results": {"b": "remote-b"}}));
    let kojac = kojac_with(&transport);
    kojac.cache().set("a", json!("cached-a")).await.unwrap();

    let request = kojac.read(vec!["a", "b"]).request().await.unwrap();
    assert_eq!(transport.last_keys(), vec!["a", "b"]);
    assert_eq!(request.results().get("a"), Some(&json!("remote-a")));
    assert!(request.ops().iter().all(|op| op.from_cache() == Some(false)));
}

/// 测试混合请求只发送未命中的操作
#[tokio::test]
async fn test_only_unperformed_operations_are_sent() {
    let transport = RecordingTransport::new();
    transport.respond("b", json!({"results": {"b": 2}}));
    let kojac = kojac_with(&transport);
    kojac.cache().set("a", json!(1)).await.unwrap();

    let request = kojac.cache_read("a,b").request().await.unwrap();
    assert_eq!(transport.last_keys(), vec!["b"]);
    assert_eq!(request.ops()[0].from_cache(), Some(true));
    assert_eq!(request.ops()[1].from_cache(), Some(false));
    assert_eq!(request.results().to_json(), json!({"a": 1, "b": 2}));
}

/// 测试 result_key 覆盖时按 result_key 命中缓存
#[tokio::test]
async fn test_cache_hit_uses_result_key() {
    let transport = RecordingTransport::new();
    let kojac = kojac_with(&transport);
    kojac.cache().set("current_user", json!({"id": 3})).await.unwrap();

    let request = kojac
        .cache_read_request("users__3", CallOptions::new().result_key("current_user"))
        .await
        .unwrap();
    assert_eq!(transport.calls(), 0);
    assert_eq!(request.result(), Some(&json!({"id": 3})));
}

/// 测试 cacheResults 为 false 时不写缓存也不记录依赖键
#[tokio::test]
async fn test_cache_results_disabled() {
    let transport = RecordingTransport::new();
    transport.respond("x", json!({"results": {"x": 1, "y": 2}}));
    let kojac = kojac_with(&transport);

    kojac
        .read_request("x", CallOptions::new().cache_results(false))
        .await
        .unwrap();
    assert!(kojac.cache().get("x").await.unwrap().is_none());
    assert!(kojac.cache().get("y").await.unwrap().is_none());
    assert_eq!(kojac.dependent_keys("x"), None);
}

/// 测试并发请求共享同一个缓存
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_share_cache() {
    let transport = RecordingTransport::new();
    for i in 0..16 {
        let key = format!("k{}", i);
        let mut results = serde_json::Map::new();
        results.insert(key.clone(), json!(i));
        results.insert("shared".to_string(), json!(i));
        transport.respond(&key, json!({ "results": results }));
    }
    let kojac = kojac_with(&transport);

    let mut handles = Vec::new();
    for i in 0..16 {
        let kojac = kojac.clone();
        handles.push(tokio::spawn(async move {
            kojac.read(format!("k{}", i)).request().await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    for i in 0..16 {
        let key = format!("k{}", i);
        assert_eq!(kojac.cache().get(&key).await.unwrap(), Some(json!(i)));
        assert_eq!(kojac.dependent_keys(&key), Some(vec!["shared".to_string()]));
    }
    let shared = kojac.cache().get("shared").await.unwrap().unwrap();
    assert!(shared.as_i64().is_some_and(|v| (0..16).contains(&v)));
}

/// 测试 Moka 后端
#[tokio::test]
async fn test_moka_backend_through_client() {
    setup_logging();
    let transport = RecordingTransport::new();
    transport.respond("m", json!({"results": {"m": "value"}}));
    let kojac = Kojac::builder(transport.clone())
        .cache(Arc::new(MokaCache::new(100, 0)))
        .build();

    kojac.read("m").request().await.unwrap();
    let cached = kojac.cache_read("m").request().await.unwrap();
    assert_eq!(transport.calls(), 1);
    assert_eq!(cached.result(), Some(&json!("value")));
}
