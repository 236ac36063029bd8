//! Shiro fuzzer runner: loads a YAML config, builds the orchestrator, and
//! drives it to completion. One job, not a subcommand tree: `--config
//! <path>` plus a couple of run-time overrides (`--iterations`, `--seed`)
//! layered on top of the loaded config.

use std::path::PathBuf;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use shiro_config::ConfigLoader;
use shiro_orchestrator::Orchestrator;

/// Shiro: differential query-testing engine for a MySQL-compatible
/// distributed database.
#[derive(Parser)]
#[command(name = "shiro", author, version, about)]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long)]
    config: PathBuf,

    /// Overrides `iterations` from the config file. 0 runs until Ctrl-C.
    #[arg(long)]
    iterations: Option<u64>,

    /// Overrides `seed` from the config file.
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::new(cli.config).load()?;
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    init_logging(config.logging.verbose, &config.logging.log_file)?;

    tracing::info!(
        dsn = %config.dsn,
        workers = config.workers,
        iterations = config.iterations,
        plan_cache_only = config.plan_cache_only,
        "starting shiro",
    );

    let orchestrator = Orchestrator::new(config).await?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received Ctrl-C, shutting down");
            ctrl_c_cancel.cancel();
        }
    });

    orchestrator.run(cancel).await?;

    tracing::info!("shiro run complete");
    Ok(())
}

/// `logging.log_file` is opened in append mode so repeated runs accumulate
/// a single trail rather than clobbering the last one; `logging.verbose`
/// maps directly onto the `tracing` level filter.
fn init_logging(verbose: bool, log_file: &str) -> anyhow::Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    if let Some(parent) = std::path::Path::new(log_file).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = std::fs::OpenOptions::new().create(true).append(true).open(log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}
