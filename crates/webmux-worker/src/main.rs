//! Remux worker binary.

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use webmux_locator::InvidiousClient;
use webmux_media::{FfmpegMuxer, HttpStreamRetriever};
use webmux_queue::{QueueConfig, RedisJobStore, RedisNotificationBus};
use webmux_worker::{metrics, JobExecutor, JobPipeline, StorageLayout, WorkerConfig};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting webmux-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if config.metrics_enabled {
        match metrics::init_metrics(config.metrics_port) {
            Ok(()) => info!("Metrics exporter listening on port {}", config.metrics_port),
            Err(e) => error!("Failed to start metrics exporter: {}", e),
        }
    }

    let executor = match build_executor(config).await {
        Ok(executor) => Arc::new(executor),
        Err(e) => {
            error!("Failed to initialize worker: {}", e);
            std::process::exit(1);
        }
    };

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_executor.shutdown();
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,webmux=debug"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

async fn build_executor(config: WorkerConfig) -> anyhow::Result<JobExecutor> {
    let queue_config = QueueConfig::from_env();

    let store = RedisJobStore::connect(queue_config.clone()).await?;
    let bus = RedisNotificationBus::connect(&queue_config).await?;
    let locator = InvidiousClient::from_env()?;
    let retriever = HttpStreamRetriever::new(config.download_timeout)?;
    let muxer = FfmpegMuxer::new(config.mux_timeout);

    let layout = StorageLayout::new(&config.mount_path);
    tokio::fs::create_dir_all(layout.outputs_dir()).await?;

    let pipeline = JobPipeline::new(
        Arc::new(store),
        Arc::new(locator),
        Arc::new(retriever),
        Arc::new(muxer),
        layout,
    );

    Ok(JobExecutor::new(
        config,
        queue_config.job_channel,
        Arc::new(bus),
        pipeline,
    ))
}
