//! kojac - 批量 CRUD 请求客户端
//!
//! 把多个 create/read/update/destroy/execute 操作打包成一次请求，
//! 优先从本地缓存解析读取，并通过异步顺序流水线完成远程获取、
//! 对象塑造与缓存写入。

#![doc(html_root_url = "https://docs.rs/kojac/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod backend;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod request;
pub mod stages;
pub mod transport;
pub mod utils;

// Re-export commonly used items
pub use crate::client::{Kojac, KojacBuilder};
pub use backend::{MemoryCache, MokaCache};
pub use cache::{CacheCoordinator, CacheStore};
pub use config::Config;
pub use error::{KojacError, OperationError, PipelineError, Result};
pub use factory::ObjectFactory;
pub use model::{FieldType, ModelDefinition};
pub use pipeline::{Pipeline, PipelineContext, Resumer, Settlement, Stage, StageControl};
pub use request::{CallOptions, KeyValues, Operation, Request, RequestBuilder, ResultMap, Verb};
pub use transport::{HttpTransport, MockFileTransport, Transport};

/// kojac 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
