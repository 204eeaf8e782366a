//! switchboard - load a Lua script, bind its functions, dispatch one call.
//!
//! ```text
//! switchboard --script model.lua add '[1, 2]'
//! switchboard --script model.lua scale '[3]' --kwargs '{"by": 2}'
//! switchboard --script model.lua --list
//! ```
//!
//! The result is printed as JSON on stdout. A failed call prints its status
//! (`{"code": "NOT_FOUND", "message": "..."}`) on stderr and exits with 1.

mod json;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use switchboard_core::{HostedRuntime, RouterBuilder, RuntimeConfig, TracingMonitor};
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "SWITCHBOARD_LOG";

#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(version, about = "Dispatch a call to a Lua endpoint", long_about = None)]
struct Args {
    /// Lua script returning a table of functions
    #[arg(short, long)]
    script: PathBuf,

    /// Runtime config file (TOML); defaults apply when it does not exist
    #[arg(short, long, default_value = "switchboard.toml")]
    config: PathBuf,

    /// Print the bound endpoint names and exit
    #[arg(long)]
    list: bool,

    /// Endpoint to call
    endpoint: Option<String>,

    /// Positional arguments as a JSON array
    #[arg(default_value = "[]")]
    args: String,

    /// Keyword arguments as a JSON object
    #[arg(long, default_value = "{}")]
    kwargs: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing();

    let config = RuntimeConfig::load(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .context("starting the async runtime")?;

    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: RuntimeConfig) -> Result<ExitCode> {
    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script {}", args.script.display()))?;
    let chunk_name = args
        .script
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "script".to_string());

    let hosted = HostedRuntime::with_config(&config)?;
    let router = RouterBuilder::new()
        .monitor(Arc::new(TracingMonitor))
        .script(hosted, source, chunk_name.as_str())
        .build()?;
    info!(script = %args.script.display(), endpoints = router.names().len(), "script bound");

    if args.list {
        for name in router.names() {
            println!("{name}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let endpoint = args
        .endpoint
        .context("an endpoint name is required unless --list is given")?;
    let call = json::call_arguments(&args.args, &args.kwargs)?;

    match router.dispatch(&endpoint, call).await {
        Ok(result) => {
            let value = json::payload_to_json(&result.result)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(status) => {
            eprintln!("{}", serde_json::to_string(&status)?);
            Ok(ExitCode::FAILURE)
        }
    }
}
