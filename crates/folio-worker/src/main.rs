use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use folio_config::FolioConfig;
use folio_engine::{FolioService, Worker};
use folio_sandbox::ProcessSandbox;
use tokio::sync::watch;

mod cli;
mod schema;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("folio-worker error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    if let Some(name) = cli.schema.as_deref() {
        println!("{}", schema::render(name)?);
        return Ok(());
    }
    init_tracing(cli.quiet, cli.verbose)?;

    let mut config = FolioConfig::load_with_dotenv().context("failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    let sandbox = ProcessSandbox::from_config(&config.sandbox)
        .context("the worker needs an out-of-process interpreter (set sandbox.interpreter)")?;
    let service = FolioService::open(config, Arc::new(sandbox))
        .await
        .context("failed to open the Folio database")?;
    let worker = Worker::new(service);

    if cli.once {
        let mut processed = 0_usize;
        while let Some(job) = worker.run_once().await? {
            tracing::info!(job_id = %job.id, status = %job.status, "job finished");
            processed += 1;
        }
        tracing::info!(processed, "queue drained");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
        }
        tracing::info!("shutdown requested, finishing current job");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    Ok(())
}

fn init_tracing(quiet: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("FOLIO_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
