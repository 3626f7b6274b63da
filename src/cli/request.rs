use crate::cli::{Cli, Commands, ReadArgs, WriteArgs};
use crate::config::Config;
use crate::client::Kojac;
use crate::error::KojacError;
use crate::metrics::get_metrics_string;
use crate::request::{CallOptions, Request};
use anyhow::{Context, Result};
use serde_json::{json, Value};

pub async fn execute(cli: &Cli) -> Result<()> {
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    let kojac = Kojac::from_config(&config).context("Failed to build client")?;

    let outcome = match &cli.command {
        Commands::Create(args) => {
            let (kv, options) = write_input(args)?;
            kojac.create_request(kv, options).await
        }
        Commands::Read(args) => {
            let options = read_options(args);
            kojac.read_request(args.keys.as_str(), options).await
        }
        Commands::Update(args) => {
            let (kv, options) = write_input(args)?;
            kojac.update_request(kv, options).await
        }
        Commands::Destroy(args) => {
            kojac
                .destroy_request(args.keys.as_str(), CallOptions::new())
                .await
        }
        Commands::Execute(args) => {
            let (kv, options) = write_input(args)?;
            kojac.execute_request(kv, options).await
        }
    };

    let result = match outcome {
        Ok(request) => {
            print_request(&request)?;
            Ok(())
        }
        Err(KojacError::Rejected(request)) => {
            print_request(&request)?;
            Err(anyhow::anyhow!(
                "request rejected: {}",
                request.error().map(ToString::to_string).unwrap_or_default()
            ))
        }
        Err(e) => Err(e).context("Request failed"),
    };

    if cli.metrics {
        print!("{}", get_metrics_string());
    }
    result
}

fn read_options(args: &ReadArgs) -> CallOptions {
    let mut options = CallOptions::new().prefer_cache(args.prefer_cache);
    if let Some(key) = &args.result_key {
        options = options.result_key(key.clone());
    }
    options
}

fn write_input(args: &WriteArgs) -> Result<((String, Value), CallOptions)> {
    let value: Value = serde_json::from_str(&args.value)
        .with_context(|| format!("Invalid JSON value for '{}'", args.key))?;
    let mut options = CallOptions::new();
    if let Some(key) = &args.result_key {
        options = options.result_key(key.clone());
    }
    if let Some(params) = &args.params {
        let params: Value = serde_json::from_str(params).context("Invalid JSON params")?;
        let Value::Object(params) = params else {
            anyhow::bail!("--params must be a JSON object");
        };
        options = options.params(params);
    }
    Ok(((args.key.clone(), value), options))
}

fn print_request(request: &Request) -> Result<()> {
    let output = json!({
        "result": request.result(),
        "results": request.results().to_json(),
        "error": request.error().map(ToString::to_string),
        "ops": request
            .ops()
            .iter()
            .map(|op| json!({
                "verb": op.verb(),
                "key": op.key(),
                "result_key": op.result_key(),
                "from_cache": op.from_cache(),
                "error": op.error().map(ToString::to_string),
            }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
