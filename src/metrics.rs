//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求、预取与缓存写入的计数指标。

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{span, Level};

/// 指标收集器
///
/// 用于收集请求流水线各环节的运行时计数
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 计数统计
    /// key: "category:outcome"
    pub counters: Arc<Mutex<BTreeMap<String, u64>>>,
    /// 远程发送的操作数累计
    pub remote_ops: Arc<Mutex<u64>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 记录一次计数
    ///
    /// # 参数
    ///
    /// * `category` - 类别（request/prefetch/remote/cache/dependents）
    /// * `outcome` - 结果（resolved/rejected/hit/miss/set/delete 等）
    pub fn record(&self, category: &str, outcome: &str) {
        let span = span!(Level::TRACE, "kojac_metric", category, outcome);
        let _enter = span.enter();
        let key = format!("{}:{}", category, outcome);
        *self.counters.lock().entry(key).or_insert(0) += 1;
    }

    /// 记录一次远程发送及其操作数
    pub fn record_remote(&self, ops: usize) {
        self.record("remote", "ops");
        *self.remote_ops.lock() += ops as u64;
    }

    /// 读取某个计数
    pub fn count(&self, category: &str, outcome: &str) -> u64 {
        self.counters
            .lock()
            .get(&format!("{}:{}", category, outcome))
            .copied()
            .unwrap_or(0)
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为文本，用于监控系统采集
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;
    let counters = metrics.counters.lock();

    let mut output = String::new();
    for (k, v) in counters.iter() {
        let (category, outcome) = k.split_once(':').unwrap_or((k.as_str(), ""));
        output.push_str(&format!(
            "kojac_events_total{{category=\"{}\", outcome=\"{}\"}} {}\n",
            category, outcome, v
        ));
    }
    output.push_str(&format!(
        "kojac_remote_operations_total {}\n",
        *metrics.remote_ops.lock()
    ));
    output
}
