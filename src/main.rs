//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块是命令行客户端的入口点。

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    kojac::cli::run().await
}
