//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kojac")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: PathBuf,

    #[arg(short, long, help = "Print metrics after the request settles")]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "create", about = "Create a resource")]
    Create(WriteArgs),

    #[command(name = "read", about = "Read one or more keys")]
    Read(ReadArgs),

    #[command(name = "update", about = "Update a resource")]
    Update(WriteArgs),

    #[command(name = "destroy", about = "Destroy one or more keys")]
    Destroy(KeysArgs),

    #[command(name = "execute", about = "Execute a remote action")]
    Execute(WriteArgs),
}

#[derive(Parser, Debug)]
pub struct KeysArgs {
    #[arg(help = "Comma-separated keys")]
    pub keys: String,
}

#[derive(Parser, Debug)]
pub struct ReadArgs {
    #[arg(help = "Comma-separated keys")]
    pub keys: String,

    #[arg(short, long, help = "Serve from the local cache when possible")]
    pub prefer_cache: bool,

    #[arg(short, long, help = "Store the primary result under this key")]
    pub result_key: Option<String>,
}

#[derive(Parser, Debug)]
pub struct WriteArgs {
    #[arg(help = "Resource key")]
    pub key: String,

    #[arg(help = "JSON value", default_value = "null")]
    pub value: String,

    #[arg(short, long, help = "Store the primary result under this key")]
    pub result_key: Option<String>,

    #[arg(long, help = "JSON object of extra parameters")]
    pub params: Option<String>,
}

mod request;

pub async fn run() -> Result<()> {
    crate::utils::setup_logging();
    let cli = Cli::parse();
    request::execute(&cli).await
}
