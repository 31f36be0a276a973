//! Scenario worker service.
//!
//! Polls the job server for parcel fills, wallpapers, parcel statistics and
//! class-name lookups, runs them against the reference LULC grid and posts
//! the results back.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use job_queue::JobQueueClient;
use raster_engine::EngineConfig;
use scenario_worker::{EngineHandle, SourceFetcher, Worker};
use tokio::sync::watch;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "scenario-worker")]
#[command(about = "Worker for parcel-relative LULC scenario jobs")]
struct Args {
    /// Job server host
    queue_host: String,

    /// Job server port
    queue_port: u16,

    /// Directory scenario rasters are written under
    output_dir: PathBuf,

    /// Reference LULC rasters, comma separated, tried before the defaults
    #[arg(long, env = "REFERENCE_RASTER")]
    reference_raster: Option<String>,

    /// Delay between polls while the queue is idle
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// HTTP timeout for queue requests and source downloads
    #[arg(long, default_value = "600")]
    request_timeout_secs: u64,

    /// Cache for downloaded source rasters (default: <output_dir>/sources)
    #[arg(long, env = "SOURCE_CACHE_DIR")]
    source_cache: Option<PathBuf>,

    /// Worker name for logs
    #[arg(short, long, env = "WORKER_NAME")]
    name: Option<String>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let worker_name = args
        .name
        .clone()
        .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));

    info!(
        name = %worker_name,
        queue = %format!("{}:{}", args.queue_host, args.queue_port),
        output_dir = %args.output_dir.display(),
        "Starting scenario worker"
    );

    let mut config = EngineConfig::from_env();
    if let Some(paths) = &args.reference_raster {
        config.prepend_reference_candidates(paths);
    }

    // No usable reference raster means no job can succeed.
    let engine = EngineHandle::spawn(config)
        .await
        .context("Failed to load the reference raster")?;

    let timeout = Duration::from_secs(args.request_timeout_secs);
    let client = JobQueueClient::new(&args.queue_host, args.queue_port, timeout)?;
    let source_cache = args
        .source_cache
        .clone()
        .unwrap_or_else(|| args.output_dir.join("sources"));
    let fetcher = SourceFetcher::new(source_cache, timeout)?;
    let worker = Worker::new(engine, fetcher, &args.output_dir);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let cancel = worker.engine().cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling current job");
            cancel.cancel();
            let _ = shutdown_tx.send(true);
        }
    });

    let poll_interval = Duration::from_millis(args.poll_interval_ms);
    info!(queue_url = %client.queue_url(), "Polling for jobs");

    while !*shutdown_rx.borrow() {
        match client.claim_next().await {
            Ok(Some(envelope)) => {
                info!(
                    job_id = %envelope.server_attrs.job_id(),
                    job_type = envelope.job.job_type(),
                    "Processing job"
                );
                let report = worker.run(&envelope).await;
                if let Err(e) = client.report(envelope.job.endpoint(), &report).await {
                    error!(job_id = %envelope.server_attrs.job_id(), error = %e, "Failed to report job");
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => match worker.reject(&e) {
                Some((endpoint, report)) => {
                    if let Err(e) = client.report(endpoint, &report).await {
                        error!(job_id = %report.server_attrs.job_id(), error = %e, "Failed to report job");
                    }
                    continue;
                }
                None => error!(error = %e, "Error claiming job"),
            },
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown_rx.changed() => {}
        }
    }

    info!(name = %worker_name, "Scenario worker stopped");
    worker.shutdown();
    Ok(())
}
