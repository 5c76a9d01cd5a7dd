//! Shared runtime utilities for the SnapVault tools
//!
//! - [`run`] installs logging, builds the tokio runtime and drives the tool's async entry point
//! - [`config`] holds the runtime/output/log-file settings passed to [`run`]
//! - [`progress`] tracks transfer counters and renders the optional progress bar
//!
//! Logs go to stdout (and optionally a log file) while the progress bar draws on stderr, so logs
//! can be piped while progress stays visible.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub mod config;
pub mod progress;

pub use config::{OutputConfig, RuntimeConfig, TracingConfig};

fn init_tracing(output: &OutputConfig, tracing: &TracingConfig) -> anyhow::Result<()> {
    // RUST_LOG wins over -v/-q when set
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(output.level()));
    let file_layer = match &tracing.log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed creating log directory {dir:?}"))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed opening log file {path:?}"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    if let Some(path) = &tracing.log_file {
        tracing::info!("logging to {:?}", path);
    }
    Ok(())
}

/// Install logging, build the runtime and run `func` to completion.
///
/// Errors are only returned for setup failures; the outcome of `func` is handed back untouched.
pub fn run<Fut>(
    output: &OutputConfig,
    runtime: &RuntimeConfig,
    tracing: &TracingConfig,
    func: impl FnOnce() -> Fut,
) -> anyhow::Result<Fut::Output>
where
    Fut: std::future::Future,
{
    init_tracing(output, tracing)?;
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let runtime = builder.build().context("failed to build tokio runtime")?;
    Ok(runtime.block_on(func()))
}
